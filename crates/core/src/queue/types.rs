//! Queue entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::HistoryError;
use crate::search::MediaKind;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Downloader could not be spawned: {0}")]
    Spawn(String),
    #[error("Duplicate queue entry for {0}")]
    Duplicate(String),
    #[error("History error: {0}")]
    History(#[from] HistoryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle states of a queue entry. QUEUED and DOWNLOADING are live;
/// everything else is terminal. FORWARDED entries never enter the live
/// queue at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Queued,
    Downloading,
    Complete,
    Cancelled,
    Removed,
    Forwarded,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "QUEUED",
            QueueStatus::Downloading => "DOWNLOADING",
            QueueStatus::Complete => "COMPLETE",
            QueueStatus::Cancelled => "CANCELLED",
            QueueStatus::Removed => "REMOVED",
            QueueStatus::Forwarded => "FORWARDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueueStatus::Queued | QueueStatus::Downloading)
    }
}

/// Mutable progress details of a live entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_left_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
}

/// One download in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Upstream programme id; queue identity.
    pub pid: String,
    /// Delivered artifact base name.
    pub nzb_name: String,
    pub kind: MediaKind,
    /// Caller-assigned correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub status: QueueStatus,
    pub details: DownloadDetails,
}

impl QueueEntry {
    pub fn new(pid: &str, nzb_name: &str, kind: MediaKind, app_id: Option<String>) -> Self {
        Self {
            pid: pid.to_string(),
            nzb_name: nzb_name.to_string(),
            kind,
            app_id,
            status: QueueStatus::Queued,
            details: DownloadDetails::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&QueueStatus::Downloading).unwrap(),
            "\"DOWNLOADING\""
        );
        assert_eq!(QueueStatus::Forwarded.as_str(), "FORWARDED");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!QueueStatus::Queued.is_terminal());
        assert!(!QueueStatus::Downloading.is_terminal());
        assert!(QueueStatus::Complete.is_terminal());
        assert!(QueueStatus::Cancelled.is_terminal());
        assert!(QueueStatus::Removed.is_terminal());
        assert!(QueueStatus::Forwarded.is_terminal());
    }
}
