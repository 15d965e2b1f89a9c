/// Record store abstraction
///
/// Checks and users are stored as JSON documents addressed by
/// `(collection, id)`. Three backends are provided:
/// - `FileStore`: one JSON file per record
/// - `SqlStore`: libsql (SQLite) with a deadpool connection pool
/// - `MemoryStore`: process-local, for tests and dry runs
pub mod file;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod sql;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sql::SqlStore;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// A stored document
pub type Record = serde_json::Value;

/// Named collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Checks,
    Users,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Checks => "checks",
            Collection::Users => "users",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: Collection, id: String },

    #[error("invalid record id {0:?}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: &str) -> Self {
        StoreError::NotFound { collection, id: id.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Keyed document storage
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record; fails if the id is taken
    async fn create(&self, collection: Collection, id: &str, record: &Record)
    -> Result<(), StoreError>;

    /// Read a record
    async fn read(&self, collection: Collection, id: &str) -> Result<Record, StoreError>;

    /// Replace an existing record, returning what was stored
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<Record, StoreError>;

    /// Delete an existing record
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// All records of a collection
    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError>;
}
