use anyhow::{Result, anyhow};
use async_trait::async_trait;
use libsql::params;
use serde_json::Value;
use std::path::Path;

use super::{Namespace, RecordStore, StoreError, initialize_database};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Durable record store backed by a local libsql database
///
/// Each operation is a single SQL statement against the `records` table, so
/// it is atomic per `(kind, key)` without any application-level locking.
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    /// Create a store instance from an already migrated pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file, run migrations and build the pool
    pub async fn open(path: impl AsRef<Path>, max_connections: usize) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let database = libsql::Builder::new_local(path).build().await?;
        let pool = LibsqlPool::builder(LibsqlManager::new(database))
            .max_size(max_connections.max(1))
            .build()?;

        let conn = pool
            .get()
            .await
            .map_err(|e| anyhow!("Failed to open record store at {}: {}", path.display(), e))?;
        initialize_database(&conn).await?;
        drop(conn);

        tracing::info!(path = %path.display(), max_connections, "Record store ready");
        Ok(Self::new_from_pool(pool))
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for LibsqlStore {
    async fn create(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp_millis();

        let inserted = conn
            .execute(
                "INSERT INTO records (kind, key, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(kind, key) DO NOTHING",
                params![namespace.as_str(), key, body, now],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::already_exists(namespace, key));
        }
        Ok(())
    }

    async fn read(&self, namespace: Namespace, key: &str) -> Result<Value, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE kind = ?1 AND key = ?2",
                params![namespace.as_str(), key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(serde_json::from_str(&body)?)
            }
            None => Err(StoreError::not_found(namespace, key)),
        }
    }

    async fn update(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let body = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp_millis();

        let updated = conn
            .execute(
                "UPDATE records SET body = ?1, updated_at = ?2 WHERE kind = ?3 AND key = ?4",
                params![body, now, namespace.as_str(), key],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::not_found(namespace, key));
        }
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM records WHERE kind = ?1 AND key = ?2",
                params![namespace.as_str(), key],
            )
            .await?;

        if deleted == 0 {
            return Err(StoreError::not_found(namespace, key));
        }
        Ok(())
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT key FROM records WHERE kind = ?1 ORDER BY key",
                params![namespace.as_str()],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }

        Ok(keys)
    }
}
