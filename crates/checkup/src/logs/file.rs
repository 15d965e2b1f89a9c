use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{LogStore, LogStoreError, codec};
use crate::ids::is_safe_file_name;

/// Suffix of active logs
pub const ACTIVE_SUFFIX: &str = ".log";

/// Suffix of rotated (compressed) logs
pub const COMPRESSED_SUFFIX: &str = ".gz.b64";

/// Log files in a single directory
///
/// Appends, compression and truncation of one log id are serialised through a
/// per-id lock, so a rotation never drops a line appended while it runs.
#[derive(Debug)]
pub struct FileLogStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: Mutex::new(HashMap::new()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, log_id: &str, suffix: &str) -> Result<PathBuf, LogStoreError> {
        if !is_safe_file_name(log_id) {
            return Err(LogStoreError::InvalidId(log_id.to_string()));
        }
        Ok(self.dir.join(format!("{log_id}{suffix}")))
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock(&self, log_id: &str) -> LogLock<'_> {
        let lock = self.locks().entry(log_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        LogLock { store: self, log_id: log_id.to_string(), guard: Some(guard) }
    }

    fn not_found(error: std::io::Error, log_id: &str) -> LogStoreError {
        if error.kind() == ErrorKind::NotFound {
            LogStoreError::NotFound(log_id.to_string())
        } else {
            LogStoreError::Io(error)
        }
    }

    async fn compress_locked(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError> {
        let source = self.path(log_id, ACTIVE_SUFFIX)?;
        let destination = self.path(new_id, COMPRESSED_SUFFIX)?;

        let raw = fs::read(&source).await.map_err(|e| Self::not_found(e, log_id))?;
        let encoded = tokio::task::spawn_blocking(move || codec::encode(&raw))
            .await
            .map_err(|e| LogStoreError::Io(std::io::Error::other(e)))??;

        let mut file =
            match fs::OpenOptions::new().write(true).create_new(true).open(&destination).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(LogStoreError::AlreadyExists(new_id.to_string()));
                }
                Err(e) => return Err(e.into()),
            };
        file.write_all(encoded.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn truncate_locked(&self, log_id: &str) -> Result<(), LogStoreError> {
        let path = self.path(log_id, ACTIVE_SUFFIX)?;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| Self::not_found(e, log_id))?;
        file.set_len(0).await?;
        Ok(())
    }
}

/// Held lock on one log id. Releasing the last holder drops the map entry.
struct LogLock<'a> {
    store: &'a FileLogStore,
    log_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LogLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of 1 means nobody else wants it
        let mut locks = self.store.locks();
        if locks.get(&self.log_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.log_id);
        }
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, log_id: &str, line: &str) -> Result<(), LogStoreError> {
        let path = self.path(log_id, ACTIVE_SUFFIX)?;
        let _guard = self.lock(log_id).await;

        fs::create_dir_all(&self.dir).await?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    async fn list(&self, include_compressed: bool) -> Result<Vec<String>, LogStoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if let Some(id) = name.strip_suffix(ACTIVE_SUFFIX) {
                ids.push(id.to_string());
            } else if let Some(id) = name.strip_suffix(COMPRESSED_SUFFIX) {
                if include_compressed {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();

        Ok(ids)
    }

    async fn compress(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError> {
        let _guard = self.lock(log_id).await;
        self.compress_locked(log_id, new_id).await
    }

    async fn decompress(&self, log_id: &str) -> Result<String, LogStoreError> {
        let path = self.path(log_id, COMPRESSED_SUFFIX)?;
        let text = fs::read_to_string(&path).await.map_err(|e| Self::not_found(e, log_id))?;
        Ok(codec::decode(&text)?)
    }

    async fn truncate(&self, log_id: &str) -> Result<(), LogStoreError> {
        let _guard = self.lock(log_id).await;
        self.truncate_locked(log_id).await
    }

    async fn read(&self, log_id: &str) -> Result<String, LogStoreError> {
        let path = self.path(log_id, ACTIVE_SUFFIX)?;
        fs::read_to_string(&path).await.map_err(|e| Self::not_found(e, log_id))
    }

    async fn rotate(&self, log_id: &str, new_id: &str) -> Result<(), LogStoreError> {
        let _guard = self.lock(log_id).await;
        self.compress_locked(log_id, new_id).await?;
        self.truncate_locked(log_id).await
    }
}
