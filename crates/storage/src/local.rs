//! String key/value storage backing the persistence store and the session.
//!
//! This is the same shape as a browser's `localStorage`: opaque string
//! values addressed by string keys, with no query capability of its own.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use curalink_config::StorageConfig;
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::debug;

use crate::connection::prepare_database;
use crate::migrations::run_migrations;
use crate::types::{StorageError, StorageResult};

#[async_trait]
pub trait LocalStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// Process-local storage, lost when the last handle is dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStorage for MemoryStorage {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.items
            .write()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

/// Storage persisted to the `local_storage` table of a SQLite database.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let pool = prepare_database(config)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("{e:#}")))?;

        run_migrations(&pool)
            .await
            .map_err(|e| StorageError::MigrationError(format!("{e:#}")))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl LocalStorage for SqliteStorage {
    async fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM local_storage WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(key, bytes = value.len(), "stored local item");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM local_storage WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Open the backend named by `config.url`.
///
/// `memory://` selects [`MemoryStorage`]; any `sqlite:` url selects
/// [`SqliteStorage`] and applies migrations.
pub async fn open_local_storage(config: &StorageConfig) -> StorageResult<Arc<dyn LocalStorage>> {
    if config.url.starts_with("memory:") {
        debug!("using in-memory local storage");
        return Ok(Arc::new(MemoryStorage::new()));
    }

    if config.url.starts_with("sqlite:") {
        let storage = SqliteStorage::connect(config).await?;
        return Ok(Arc::new(storage));
    }

    Err(StorageError::UnsupportedUrl(config.url.clone()))
}
