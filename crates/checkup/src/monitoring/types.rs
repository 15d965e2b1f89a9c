use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::CheckState;

/// Why a probe produced no response code
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ProbeError {
    /// The deadline elapsed before a response arrived
    #[error("timeout")]
    Timeout,

    /// `protocol://url` did not form a usable URL
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Connection, TLS or protocol failure
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result of one probe attempt: exactly one of a response code or an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckOutcome {
    ResponseCode(u16),
    Error(ProbeError),
}

impl CheckOutcome {
    pub fn timeout() -> Self {
        CheckOutcome::Error(ProbeError::Timeout)
    }

    pub fn response_code(&self) -> Option<u16> {
        match self {
            CheckOutcome::ResponseCode(code) => Some(*code),
            CheckOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ProbeError> {
        match self {
            CheckOutcome::ResponseCode(_) => None,
            CheckOutcome::Error(error) => Some(error),
        }
    }

    /// `up` only for a response whose code is in `success_codes`
    pub fn state(&self, success_codes: &[u16]) -> CheckState {
        match self {
            CheckOutcome::ResponseCode(code) if success_codes.contains(code) => CheckState::Up,
            _ => CheckState::Down,
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::ResponseCode(code) => write!(f, "response {code}"),
            CheckOutcome::Error(error) => write!(f, "{error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_from_outcome() {
        let codes = [200, 204];
        assert_eq!(CheckOutcome::ResponseCode(200).state(&codes), CheckState::Up);
        assert_eq!(CheckOutcome::ResponseCode(500).state(&codes), CheckState::Down);
        assert_eq!(CheckOutcome::timeout().state(&codes), CheckState::Down);
        assert_eq!(
            CheckOutcome::Error(ProbeError::Transport("refused".into())).state(&codes),
            CheckState::Down
        );
        assert_eq!(CheckOutcome::ResponseCode(200).state(&[]), CheckState::Down);
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_value(CheckOutcome::ResponseCode(503)).unwrap(),
            json!({"responseCode": 503})
        );
        assert_eq!(
            serde_json::to_value(CheckOutcome::timeout()).unwrap(),
            json!({"error": {"kind": "timeout"}})
        );
        assert_eq!(
            serde_json::to_value(CheckOutcome::Error(ProbeError::Transport("reset".into())))
                .unwrap(),
            json!({"error": {"kind": "transport", "detail": "reset"}})
        );
    }
}
