//! Encoding of rotated logs: gzip, then standard base64.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("gzip stream error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("rotated log is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("rotated log is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Gzip `data` and return it as base64 text
pub fn encode(data: &[u8]) -> Result<String, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Reverse [`encode`]
pub fn decode(text: &str) -> Result<String, CodecError> {
    let compressed = STANDARD.decode(text.trim())?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(String::from_utf8(raw)?)
}
