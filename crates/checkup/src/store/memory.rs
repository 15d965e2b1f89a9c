use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Collection, Record, RecordStore, StoreError};

/// Process-local store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(&'static str, String), Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<(&'static str, String), Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<(), StoreError> {
        let mut records = self.records();
        let key = (collection.as_str(), id.to_string());
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists { collection, id: id.to_string() });
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        self.records()
            .get(&(collection.as_str(), id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<Record, StoreError> {
        match self.records().get_mut(&(collection.as_str(), id.to_string())) {
            Some(stored) => {
                *stored = record.clone();
                Ok(record.clone())
            }
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.records()
            .remove(&(collection.as_str(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records()
            .iter()
            .filter(|((name, _), _)| *name == collection.as_str())
            .map(|(_, record)| record.clone())
            .collect())
    }
}
