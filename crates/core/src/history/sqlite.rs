//! SQLite-backed history store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::search::MediaKind;

use super::{History, HistoryEntry, HistoryError, HistoryStatus};

pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the history database at `path`.
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pid TEXT NOT NULL,
                nzb_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,
                app_id TEXT,
                size_mb REAL,
                artifact_path TEXT,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_recorded_at ON history(recorded_at);
            "#,
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;
        Ok(())
    }

    fn insert(&self, entry: &HistoryEntry, status: HistoryStatus) -> Result<(), HistoryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| HistoryError::Database("connection lock poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO history (pid, nzb_name, kind, status, app_id, size_mb, artifact_path, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.pid,
                entry.nzb_name,
                entry.kind.as_str(),
                status.as_str(),
                entry.app_id,
                entry.size_mb,
                entry.artifact_path,
                entry.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;
        Ok(())
    }
}

impl History for SqliteHistory {
    fn add_complete(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.insert(&entry, HistoryStatus::Complete)
    }

    fn add_cancelled(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.insert(&entry, HistoryStatus::Cancelled)
    }

    fn add_forwarded(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.insert(&entry, HistoryStatus::Forwarded)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| HistoryError::Database("connection lock poisoned".to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT pid, nzb_name, kind, status, app_id, size_mb, artifact_path, recorded_at
                 FROM history ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let kind: String = row.get(2)?;
                let status: String = row.get(3)?;
                let recorded_at: String = row.get(7)?;
                Ok(HistoryEntry {
                    pid: row.get(0)?,
                    nzb_name: row.get(1)?,
                    kind: MediaKind::parse(&kind).unwrap_or(MediaKind::Unknown),
                    status: HistoryStatus::parse(&status).unwrap_or(HistoryStatus::Complete),
                    app_id: row.get(4)?,
                    size_mb: row.get(5)?,
                    artifact_path: row.get(6)?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| HistoryError::Database(e.to_string()))?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pid: &str, status: HistoryStatus) -> HistoryEntry {
        HistoryEntry {
            pid: pid.to_string(),
            nzb_name: format!("{}.S01E01", pid),
            kind: MediaKind::Tv,
            status,
            app_id: Some("sonarr-42".to_string()),
            size_mb: Some(812.5),
            artifact_path: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_list_most_recent_first() {
        let store = SqliteHistory::in_memory().unwrap();
        store.add_complete(entry("m0000001", HistoryStatus::Complete)).unwrap();
        store.add_cancelled(entry("m0000002", HistoryStatus::Cancelled)).unwrap();

        let entries = store.list(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pid, "m0000002");
        assert_eq!(entries[0].status, HistoryStatus::Cancelled);
        assert_eq!(entries[1].status, HistoryStatus::Complete);
    }

    #[test]
    fn test_list_respects_limit() {
        let store = SqliteHistory::in_memory().unwrap();
        for i in 0..5 {
            store
                .add_complete(entry(&format!("m000000{}", i), HistoryStatus::Complete))
                .unwrap();
        }
        assert_eq!(store.list(3).unwrap().len(), 3);
    }

    #[test]
    fn test_forwarded_round_trips() {
        let store = SqliteHistory::in_memory().unwrap();
        store.add_forwarded(entry("m0000009", HistoryStatus::Forwarded)).unwrap();
        let entries = store.list(1).unwrap();
        assert_eq!(entries[0].status, HistoryStatus::Forwarded);
        assert_eq!(entries[0].size_mb, Some(812.5));
    }
}
