//! Terminal download history.
//!
//! Every download that leaves the live queue lands here exactly once:
//! completed with its delivered artifact, cancelled with archiving
//! requested, or forwarded to an external endpoint without ever entering
//! the queue.

mod sqlite;

pub use sqlite::SqliteHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::search::MediaKind;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Terminal disposition of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Complete,
    Cancelled,
    Forwarded,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Complete => "complete",
            HistoryStatus::Cancelled => "cancelled",
            HistoryStatus::Forwarded => "forwarded",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(HistoryStatus::Complete),
            "cancelled" => Some(HistoryStatus::Cancelled),
            "forwarded" => Some(HistoryStatus::Forwarded),
            _ => None,
        }
    }
}

/// A finished download as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub pid: String,
    pub nzb_name: String,
    pub kind: MediaKind,
    pub status: HistoryStatus,
    pub app_id: Option<String>,
    pub size_mb: Option<f64>,
    pub artifact_path: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Sink for terminal queue entries.
pub trait History: Send + Sync {
    fn add_complete(&self, entry: HistoryEntry) -> Result<(), HistoryError>;
    fn add_cancelled(&self, entry: HistoryEntry) -> Result<(), HistoryError>;
    fn add_forwarded(&self, entry: HistoryEntry) -> Result<(), HistoryError>;
    /// Most recent entries first.
    fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError>;
}
