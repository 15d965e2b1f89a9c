//! Record id generation.

use rand::Rng;

/// Length of every generated id
pub const ID_LENGTH: usize = 20;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random lowercase alphanumeric id of [`ID_LENGTH`] characters
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Whether `id` has the shape produced by [`generate`]
pub fn is_valid(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

/// Whether `name` can be used as a single path component
pub(crate) fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..100 {
            let id = generate();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(is_valid(&id), "generated id {id} should be valid");
        }
    }

    #[test]
    fn test_is_valid_rejects_bad_ids() {
        assert!(!is_valid(""));
        assert!(!is_valid("abc"));
        assert!(!is_valid("ABCDEFGHIJKLMNOPQRST"));
        assert!(!is_valid("abcdefghij-lmnopqrst"));
        assert!(!is_valid("abcdefghijklmnopqrstu"));
        assert!(is_valid("abcdefghij0123456789"));
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("abcdefghij0123456789"));
        assert!(is_safe_file_name("abc-1700000000000"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name("../etc/passwd"));
        assert!(!is_safe_file_name("a\\b"));
    }
}
