//! Testing utilities and mock implementations for E2E tests.
//!
//! Mock implementations of the external-facing traits, so search and queue
//! behaviour can be tested without a catalogue service, a downloader binary
//! or a real notification endpoint.

mod mock_catchup;
mod mock_history;
mod recording_sink;

pub use mock_catchup::MockCatchupService;
pub use mock_history::MockHistory;
pub use recording_sink::RecordingSink;

pub use crate::kvstore::MemoryKvStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::search::{MediaKind, SearchResult, SourceRequest};
    use crate::upstream::{ProgrammeDetails, ProgrammeHit, ProgrammeKind};

    /// Create a catalogue search hit with reasonable defaults.
    pub fn programme_hit(id: &str, title: &str, kind: ProgrammeKind) -> ProgrammeHit {
        ProgrammeHit {
            id: id.to_string(),
            title: title.to_string(),
            kind,
            channel: Some("BBC One".to_string()),
            categories: vec!["Entertainment".to_string()],
        }
    }

    /// Create episode details carrying series/episode structure.
    pub fn episode_details(
        id: &str,
        show: &str,
        series: u32,
        episode: u32,
    ) -> ProgrammeDetails {
        ProgrammeDetails {
            id: id.to_string(),
            title: format!("{}: Series {} - Episode {}", show, series, episode),
            kind: ProgrammeKind::Episode,
            channel: Some("BBC One".to_string()),
            category: Some("Entertainment".to_string()),
            series: Some(series),
            episode: Some(episode),
            episode_title: Some(format!("Episode {}", episode)),
            runtime_minutes: Some(45),
            first_broadcast: Some(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()),
        }
    }

    /// Create a search result the way the native engine would emit it.
    pub fn search_result(id: &str, title: &str, series: u32, episode: u32) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: title.to_string(),
            channel: Some("BBC One".to_string()),
            kind: MediaKind::Tv,
            series: Some(series),
            episode: Some(episode),
            episode_title: Some(format!("Episode {}", episode)),
            size_bytes: Some(810 * 1024 * 1024),
            publish_date: Some(Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap()),
            request: SourceRequest {
                term: title.to_lowercase(),
                raw_line: None,
            },
        }
    }
}
