use std::path::Path;

use async_trait::async_trait;
use libsql::params;

use super::migrations::run_migrations;
use super::pool::{LibsqlManager, LibsqlPool};
use super::{Collection, Record, RecordStore, StoreError};

/// Records kept in a libsql (SQLite) database
pub struct SqlStore {
    pool: LibsqlPool,
}

impl SqlStore {
    /// Open (or create) a local database file and migrate it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let database = libsql::Builder::new_local(path.as_ref()).build().await?;
        let pool = LibsqlPool::builder(LibsqlManager::new(database))
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let store = Self { pool };
        let conn = store.get_conn().await?;
        run_migrations(&conn).await?;

        Ok(store)
    }

    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqlStore {
    async fn create(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO records (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    collection.to_string(),
                    id.to_string(),
                    serde_json::to_string(record)?,
                    chrono::Utc::now().timestamp_millis()
                ],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists { collection, id: id.to_string() });
        }
        Ok(())
    }

    async fn read(&self, collection: Collection, id: &str) -> Result<Record, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.to_string(), id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(serde_json::from_str(&body)?)
            }
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        record: &Record,
    ) -> Result<Record, StoreError> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE records SET body = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
                params![
                    collection.to_string(),
                    id.to_string(),
                    serde_json::to_string(record)?,
                    chrono::Utc::now().timestamp_millis()
                ],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(record.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.to_string(), id.to_string()],
            )
            .await?;

        if deleted == 0 {
            return Err(StoreError::not_found(collection, id));
        }
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ?1 ORDER BY id",
                params![collection.to_string()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            records.push(serde_json::from_str(&body)?);
        }

        Ok(records)
    }
}
