//! libSQL-backed `SessionStore`.
//!
//! One row per `(namespace, key)`; the value column holds the JSON text.
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::StoreError;
use crate::store::migrations;
use crate::store::traits::SessionStore;

/// Namespace used when the caller does not pick one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// libSQL session store.
///
/// Holds a single connection that is reused for all operations.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    namespace: String,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Session store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            namespace: DEFAULT_NAMESPACE.to_string(),
        })
    }

    /// Scope every key to `namespace`, so several sessions can share one file.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl SessionStore for LibSqlStore {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM session_entries WHERE namespace = ?1 AND key = ?2",
                params![self.namespace.as_str(), key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("load: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("load: {e}")))?;
                let value = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("load: {e}"))),
        }
    }

    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let raw =
            serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO session_entries (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (namespace, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![self.namespace.as_str(), key, raw, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("save: {e}")))?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<bool, StoreError> {
        let count = self
            .conn
            .execute(
                "DELETE FROM session_entries WHERE namespace = ?1 AND key = ?2",
                params![self.namespace.as_str(), key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("clear: {e}")))?;
        Ok(count > 0)
    }
}
