//! Attempt state persistence
//!
//! The durable substrate behind the attempt engine is a plain string-keyed
//! get/set/delete port, so the engine runs identically against SQLite and an
//! in-memory fake. The substrate offers no transactions; the store above it
//! compensates with whole-state read-merge-write per mutation.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tokio::sync::RwLock;

/// Storage errors, always recovered at the store boundary.
///
/// Reads degrade to "no prior attempt" and writes leave the in-memory state
/// authoritative, so these never propagate past the attempt engine.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage write failed: {0}")]
    Write(String),
}

/// Durable string-keyed storage port
#[async_trait::async_trait]
pub trait AttemptStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// HashMap-backed storage, for tests and ephemeral hosts
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, e.g. to simulate a previously persisted (or corrupted)
    /// record.
    pub async fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(key.into(), value.into());
    }
}

#[async_trait::async_trait]
impl AttemptStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// SQLite Storage
// ============================================================================

/// SQLite-backed storage, one key/value row per attempt
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect and initialize the backing table
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| StorageError::Read(e.to_string()))?;

        let storage = Self { pool };
        storage.init().await?;
        Ok(storage)
    }

    /// Open (creating if missing) a database file
    pub async fn connect_file(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::Read(e.to_string()))?;

        let storage = Self { pool };
        storage.init().await?;
        Ok(storage)
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attempt_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl AttemptStorage for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM attempt_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Read(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO attempt_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_state WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
