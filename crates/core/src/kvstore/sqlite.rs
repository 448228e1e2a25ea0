//! SQLite-backed key-value store implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{pattern_to_like, KvError, KvStore};

/// SQLite-backed key-value store with lazy expiry.
///
/// Expired rows are filtered out of every read and physically removed
/// opportunistically on writes.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the store at `path`.
    pub fn new(path: &Path) -> Result<Self, KvError> {
        let conn = Connection::open(path).map_err(|e| KvError::Store(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, KvError> {
        let conn = Connection::open_in_memory().map_err(|e| KvError::Store(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), KvError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv(expires_at);
            "#,
        )
        .map_err(|e| KvError::Store(e.to_string()))?;
        Ok(())
    }

    fn now_epoch() -> i64 {
        Utc::now().timestamp()
    }

    fn purge_expired(conn: &Connection) {
        // Best-effort housekeeping; reads already exclude expired rows.
        let _ = conn.execute(
            "DELETE FROM kv WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![Self::now_epoch()],
        );
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT value FROM kv
                 WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            )
            .map_err(|e| KvError::Store(e.to_string()))?;

        let mut rows = stmt
            .query(params![key, Self::now_epoch()])
            .map_err(|e| KvError::Store(e.to_string()))?;

        match rows.next().map_err(|e| KvError::Store(e.to_string()))? {
            Some(row) => {
                let value: String = row.get(0).map_err(|e| KvError::Store(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let conn = self.conn.lock().unwrap();
        Self::purge_expired(&conn);

        let expires_at = ttl.map(|t| Self::now_epoch() + t.as_secs() as i64);
        conn.execute(
            "INSERT INTO kv (key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, expires_at = ?3",
            params![key, value, expires_at],
        )
        .map_err(|e| KvError::Store(e.to_string()))?;
        Ok(())
    }

    fn del(&self, key: &str) -> Result<(), KvError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| KvError::Store(e.to_string()))?;
        Ok(())
    }

    fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let like = pattern_to_like(pattern);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT key FROM kv
                 WHERE key LIKE ?1 ESCAPE '\\'
                   AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY key",
            )
            .map_err(|e| KvError::Store(e.to_string()))?;

        let keys = stmt
            .query_map(params![like, Self::now_epoch()], |row| row.get(0))
            .map_err(|e| KvError::Store(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| KvError::Store(e.to_string()))?;
        Ok(keys)
    }

    fn del_matching(&self, pattern: &str) -> Result<u64, KvError> {
        let like = pattern_to_like(pattern);
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM kv WHERE key LIKE ?1 ESCAPE '\\'",
                params![like],
            )
            .map_err(|e| KvError::Store(e.to_string()))?;
        Ok(deleted as u64)
    }
}
