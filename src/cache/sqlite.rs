use std::time::Duration;

use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use super::CacheStore;
use crate::error::Result;

pub type CachePool = Pool<SqliteConnectionManager>;

pub fn create_pool(db_path: &str) -> Result<CachePool> {
    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::new(manager)?;
    Ok(pool)
}

/// Cache persisted in a SQLite file, so warm entries survive restarts.
pub struct SqliteStore {
    pool: CachePool,
}

impl SqliteStore {
    pub fn new(pool: CachePool) -> Result<Self> {
        let store = Self { pool };
        store.init()?;
        Ok(store)
    }

    pub fn open(db_path: &str) -> Result<Self> {
        tracing::info!("Opening response cache at {}", db_path);
        Self::new(create_pool(db_path)?)
    }

    fn init(&self) -> Result<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_expires_at ON cache_entries(expires_at)",
            [],
        )?;

        Ok(())
    }

    /// Delete every expired row. Reads already skip them; this only reclaims space.
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self.pool.get()?;
        let now = Utc::now().timestamp_millis();
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1",
            params![now],
        )?;
        Ok(removed)
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.pool.get()?;
        let now = Utc::now().timestamp_millis();

        let result = conn.query_row(
            "SELECT value, expires_at FROM cache_entries WHERE key = ?1",
            params![key],
            |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((value, expires_at)) if expires_at > now => Ok(Some(value)),
            Ok(_) => {
                conn.execute(
                    "DELETE FROM cache_entries WHERE key = ?1 AND expires_at <= ?2",
                    params![key, now],
                )?;
                Ok(None)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let conn = self.pool.get()?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);

        conn.execute(
            "INSERT INTO cache_entries (key, value, expires_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
            params![key, value, expires_at],
        )?;

        Ok(())
    }
}
