use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use thiserror::Error;

/// Key holding the JSON map of every date-keyed record
pub const CALENDAR_DAYS_KEY: &str = "calendarDays";
pub const TASKS_KEY: &str = "tasks";
pub const ENTRIES_KEY: &str = "entries";
pub const VIDEOS_KEY: &str = "videos";
pub const SCREENSHOTS_KEY: &str = "screenshots";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create cache directory: {0}")]
    DirectoryError(String),
    #[error("Value under '{key}' is not valid JSON for its type: {source}")]
    DecodeError {
        key: String,
        source: serde_json::Error,
    },
    #[error("Failed to encode value for '{key}': {source}")]
    EncodeError {
        key: String,
        source: serde_json::Error,
    },
}

/// Persistent string key/value store, one JSON document per key
pub struct LocalCache {
    conn: Connection,
}

impl LocalCache {
    /// Open (or create) the cache file and initialize the schema
    pub fn new(path: &str) -> Result<Self, CacheError> {
        let db_path = PathBuf::from(path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;

        let cache = LocalCache { conn };
        cache.initialize_schema()?;

        Ok(cache)
    }

    /// In-memory cache, gone when dropped
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let cache = LocalCache {
            conn: Connection::open_in_memory()?,
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<(), CacheError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Raw string stored under `key`, if any
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Replace the string stored under `key`
    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![
                key,
                value,
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Decode the JSON document under `key`. A missing key is `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::DecodeError {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Encode `value` as JSON and store it under `key`
    pub fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value).map_err(|source| CacheError::EncodeError {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, &raw)
    }
}
