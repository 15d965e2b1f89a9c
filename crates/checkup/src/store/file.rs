use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::{Collection, Record, RecordStore, StoreError};
use crate::ids::is_safe_file_name;

const RECORD_EXTENSION: &str = "json";

/// Stores every record as `<base>/<collection>/<id>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.base_dir.join(collection.as_str())
    }

    fn record_path(&self, collection: Collection, id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_file_name(id) {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.collection_dir(collection).join(format!("{id}.{RECORD_EXTENSION}")))
    }

    fn map_not_found(error: std::io::Error, collection: Collection, id: &str) -> StoreError {
        if error.kind() == ErrorKind::NotFound {
            StoreError::not_found(collection, id)
        } else {
            StoreError::Io(error)
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let body = serde_json::to_vec(record)?;

        fs::create_dir_all(self.collection_dir(collection)).await?;
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists { collection, id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&body).await?;
        file.flush().await?;

        Ok(())
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        let path = self.record_path(collection, id)?;
        let raw = fs::read(&path).await.map_err(|e| Self::map_not_found(e, collection, id))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<Record, StoreError> {
        let path = self.record_path(collection, id)?;
        fs::metadata(&path).await.map_err(|e| Self::map_not_found(e, collection, id))?;

        // Write beside the record and rename over it so readers never see a torn file.
        let staging = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        fs::write(&staging, serde_json::to_vec(record)?).await?;
        fs::rename(&staging, &path).await?;

        Ok(record.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        fs::remove_file(&path).await.map_err(|e| Self::map_not_found(e, collection, id))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = match fs::read(&path).await {
                Ok(raw) => raw,
                // Deleted between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable record: {}", e),
            }
        }

        Ok(records)
    }
}
