//! Mock history store for testing.

use std::sync::Mutex;

use crate::history::{History, HistoryEntry, HistoryError, HistoryStatus};

/// Records every terminal entry it receives, for assertions.
#[derive(Default)]
pub struct MockHistory {
    entries: Mutex<Vec<(HistoryStatus, HistoryEntry)>>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries, in insertion order.
    pub fn entries(&self) -> Vec<(HistoryStatus, HistoryEntry)> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries recorded with the given status.
    pub fn entries_with(&self, status: HistoryStatus) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == status)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn record(&self, status: HistoryStatus, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.lock().unwrap().push((status, entry));
        Ok(())
    }
}

impl History for MockHistory {
    fn add_complete(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.record(HistoryStatus::Complete, entry)
    }

    fn add_cancelled(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.record(HistoryStatus::Cancelled, entry)
    }

    fn add_forwarded(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.record(HistoryStatus::Forwarded, entry)
    }

    fn list(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .rev()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}
