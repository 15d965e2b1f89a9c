//! Per-check audit logs.
//!
//! Every evaluation appends one JSON line to the check's active log. The
//! rotator periodically compresses each active log into a rotated file and
//! truncates the active one so appends keep going to the same path.

pub mod codec;
pub mod file;
pub mod rotator;

pub use file::FileLogStore;
pub use rotator::{LogRotator, RotationSummary};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("log {0} not found")]
    NotFound(String),

    #[error("log {0} already exists")]
    AlreadyExists(String),

    #[error("invalid log id {0:?}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] codec::CodecError),
}

/// Append-only log files with rotation support
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append `line` plus a newline, creating the log if needed
    async fn append(&self, log_id: &str, line: &str) -> Result<(), LogStoreError>;

    /// Ids of active logs, plus rotated ones when `include_compressed` is set
    async fn list(&self, include_compressed: bool) -> Result<Vec<String>, LogStoreError>;

    /// Write the compressed contents of active log `log_id` to rotated log `new_id`
    async fn compress(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError>;

    /// Contents of rotated log `log_id`
    async fn decompress(&self, log_id: &str) -> Result<String, LogStoreError>;

    /// Empty active log `log_id`, keeping the file in place
    async fn truncate(&self, log_id: &str) -> Result<(), LogStoreError>;

    /// Contents of active log `log_id`
    async fn read(&self, log_id: &str) -> Result<String, LogStoreError>;

    /// Compress then truncate
    async fn rotate(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError> {
        self.compress(log_id, new_id).await?;
        self.truncate(log_id).await
    }
}
