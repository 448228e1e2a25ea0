//! Mock catalogue service for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::upstream::{
    CatchupService, ProgrammeDetails, ProgrammeHit, ProgrammeRef, UpstreamError,
};

/// Mock implementation of [`CatchupService`].
///
/// Provides controllable behavior for testing:
/// - Configurable search hits, episode lists and details
/// - Recorded search terms and detail lookups for assertions
/// - One-shot failure injection
pub struct MockCatchupService {
    hits: Mutex<HashMap<String, Vec<ProgrammeHit>>>,
    episodes: Mutex<HashMap<String, Vec<ProgrammeRef>>>,
    details: Mutex<HashMap<String, ProgrammeDetails>>,
    search_calls: Mutex<Vec<String>>,
    details_calls: Mutex<Vec<String>>,
    fail_searches: Mutex<bool>,
}

impl Default for MockCatchupService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatchupService {
    pub fn new() -> Self {
        Self {
            hits: Mutex::new(HashMap::new()),
            episodes: Mutex::new(HashMap::new()),
            details: Mutex::new(HashMap::new()),
            search_calls: Mutex::new(Vec::new()),
            details_calls: Mutex::new(Vec::new()),
            fail_searches: Mutex::new(false),
        }
    }

    /// Configure the hits returned for a search term (matched lowercased).
    pub fn set_hits(&self, term: &str, hits: Vec<ProgrammeHit>) {
        self.hits
            .lock()
            .unwrap()
            .insert(term.to_lowercase(), hits);
    }

    /// Configure the expansion of an aggregate id.
    pub fn add_episodes(&self, id: &str, refs: Vec<ProgrammeRef>) {
        self.episodes.lock().unwrap().insert(id.to_string(), refs);
    }

    /// Configure details for one programme id.
    pub fn add_details(&self, details: ProgrammeDetails) {
        self.details
            .lock()
            .unwrap()
            .insert(details.id.clone(), details);
    }

    /// Make every subsequent search fail until cleared.
    pub fn fail_searches(&self, fail: bool) {
        *self.fail_searches.lock().unwrap() = fail;
    }

    /// Terms searched so far, in order.
    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    /// Ids that had details fetched, in order.
    pub fn details_calls(&self) -> Vec<String> {
        self.details_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatchupService for MockCatchupService {
    async fn search(&self, term: &str) -> Result<Vec<ProgrammeHit>, UpstreamError> {
        self.search_calls.lock().unwrap().push(term.to_string());
        if *self.fail_searches.lock().unwrap() {
            return Err(UpstreamError::ConnectionFailed("mock outage".to_string()));
        }
        Ok(self
            .hits
            .lock()
            .unwrap()
            .get(&term.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn episodes_of(&self, id: &str) -> Result<Vec<ProgrammeRef>, UpstreamError> {
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn details(&self, id: &str) -> Result<Option<ProgrammeDetails>, UpstreamError> {
        self.details_calls.lock().unwrap().push(id.to_string());
        Ok(self.details.lock().unwrap().get(id).cloned())
    }
}
