use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage quota exceeded ({0} entries)")]
    QuotaExceeded(usize),
}

/// Persistent key-value medium scoped to one device/profile.
///
/// The SQLite variant is the durable medium used by the host binary. The
/// memory variant backs tests and ephemeral hosts; its optional quota models
/// a capacity-bounded medium that rejects writes once full.
#[derive(Clone, Debug)]
pub enum KvStore {
    Sqlite(SqlitePool),
    Memory(MemoryStore),
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            entries: Arc::default(),
            quota: Some(max_entries),
        }
    }
}

impl KvStore {
    pub fn sqlite(pool: SqlitePool) -> Self {
        KvStore::Sqlite(pool)
    }

    pub fn memory() -> Self {
        KvStore::Memory(MemoryStore::new())
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        if let KvStore::Sqlite(pool) = self {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            KvStore::Sqlite(pool) => {
                let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
                    .bind(key)
                    .fetch_optional(pool)
                    .await?;
                Ok(value)
            }
            KvStore::Memory(mem) => Ok(mem.entries.read().await.get(key).cloned()),
        }
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            KvStore::Sqlite(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO kv_store (key, value, updated_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(chrono::Utc::now())
                .execute(pool)
                .await?;
                Ok(())
            }
            KvStore::Memory(mem) => {
                let mut entries = mem.entries.write().await;
                if let Some(quota) = mem.quota {
                    if !entries.contains_key(key) && entries.len() >= quota {
                        return Err(StoreError::QuotaExceeded(quota));
                    }
                }
                entries.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            KvStore::Sqlite(pool) => {
                sqlx::query("DELETE FROM kv_store WHERE key = ?")
                    .bind(key)
                    .execute(pool)
                    .await?;
            }
            KvStore::Memory(mem) => {
                mem.entries.write().await.remove(key);
            }
        }
        Ok(())
    }

    /// Removes every key starting with `prefix` and returns how many were dropped.
    pub async fn remove_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        match self {
            KvStore::Sqlite(pool) => {
                let result = sqlx::query("DELETE FROM kv_store WHERE substr(key, 1, length(?1)) = ?1")
                    .bind(prefix)
                    .execute(pool)
                    .await?;
                Ok(result.rows_affected())
            }
            KvStore::Memory(mem) => {
                let mut entries = mem.entries.write().await;
                let before = entries.len();
                entries.retain(|key, _| !key.starts_with(prefix));
                Ok((before - entries.len()) as u64)
            }
        }
    }

    pub async fn keys(&self) -> Result<Vec<String>, StoreError> {
        match self {
            KvStore::Sqlite(pool) => {
                let keys = sqlx::query_scalar::<_, String>("SELECT key FROM kv_store ORDER BY key")
                    .fetch_all(pool)
                    .await?;
                Ok(keys)
            }
            KvStore::Memory(mem) => Ok(mem.entries.read().await.keys().cloned().collect()),
        }
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        if let KvStore::Sqlite(pool) = self {
            sqlx::query("SELECT 1").fetch_one(pool).await?;
        }
        Ok(())
    }
}
