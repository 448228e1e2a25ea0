//! Typed search-response cache over the key-value store.
//!
//! Cache keys are derived deterministically from (term, page, filters) so a
//! synonym target change can evict every page keyed by that term with one
//! prefix delete. Stored payloads keep `publish_date` as an RFC 3339 string
//! and reconstruct `DateTime<Utc>` explicitly on every read path; the store
//! is never trusted to round-trip types on its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kvstore::{KvError, KvStore};
use crate::search::{
    Facet, MediaKind, Pagination, SearchFilters, SearchResponse, SearchResult, SourceRequest,
};

const SEARCH_PREFIX: &str = "search";

/// Serialized form of a search result. `publish_date` is a plain string;
/// the off-schedule cache stores its items in the same shape.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedResult {
    id: String,
    title: String,
    channel: Option<String>,
    kind: MediaKind,
    series: Option<u32>,
    episode: Option<u32>,
    episode_title: Option<String>,
    size_bytes: Option<u64>,
    publish_date: Option<String>,
    term: String,
    raw_line: Option<String>,
}

impl From<&SearchResult> for CachedResult {
    fn from(r: &SearchResult) -> Self {
        Self {
            id: r.id.clone(),
            title: r.title.clone(),
            channel: r.channel.clone(),
            kind: r.kind,
            series: r.series,
            episode: r.episode,
            episode_title: r.episode_title.clone(),
            size_bytes: r.size_bytes,
            publish_date: r.publish_date.map(|d| d.to_rfc3339()),
            term: r.request.term.clone(),
            raw_line: r.request.raw_line.clone(),
        }
    }
}

impl CachedResult {
    pub(crate) fn into_result(self) -> SearchResult {
        SearchResult {
            id: self.id,
            title: self.title,
            channel: self.channel,
            kind: self.kind,
            series: self.series,
            episode: self.episode,
            episode_title: self.episode_title,
            size_bytes: self.size_bytes,
            publish_date: self.publish_date.as_deref().and_then(parse_cached_date),
            request: SourceRequest {
                term: self.term,
                raw_line: self.raw_line,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedResponse {
    results: Vec<CachedResult>,
    facets: Vec<Facet>,
    pagination: Pagination,
}

impl From<&SearchResponse> for CachedResponse {
    fn from(response: &SearchResponse) -> Self {
        Self {
            results: response.results.iter().map(CachedResult::from).collect(),
            facets: response.facets.clone(),
            pagination: response.pagination,
        }
    }
}

impl CachedResponse {
    /// Rebuild the typed response, parsing date strings back into
    /// `DateTime<Utc>`. Unparseable dates degrade to absent.
    fn into_response(self) -> SearchResponse {
        SearchResponse {
            results: self
                .results
                .into_iter()
                .map(CachedResult::into_result)
                .collect(),
            facets: self.facets,
            pagination: self.pagination,
        }
    }
}

fn parse_cached_date(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(raw = raw, error = %e, "Discarding unparseable cached date");
            None
        }
    }
}

/// TTL-bounded cache for search responses.
pub struct SearchResultCache {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl SearchResultCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(term: &str, page: usize, filters: &SearchFilters) -> String {
        format!(
            "{}:{}:{}:{}",
            SEARCH_PREFIX,
            term.to_lowercase(),
            page,
            filters.cache_token()
        )
    }

    /// Look up a cached response, reconstructing date fields.
    pub fn get(
        &self,
        term: &str,
        page: usize,
        filters: &SearchFilters,
    ) -> Result<Option<SearchResponse>, KvError> {
        let key = Self::key(term, page, filters);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<CachedResponse>(&raw) {
            Ok(cached) => Ok(Some(cached.into_response())),
            Err(e) => {
                // A corrupt entry is dropped rather than propagated.
                warn!(key = %key, error = %e, "Evicting undeserializable cache entry");
                self.store.del(&key)?;
                Ok(None)
            }
        }
    }

    /// Store a response under the derived key.
    pub fn set(
        &self,
        term: &str,
        page: usize,
        filters: &SearchFilters,
        response: &SearchResponse,
    ) -> Result<(), KvError> {
        let key = Self::key(term, page, filters);
        let payload = serde_json::to_string(&CachedResponse::from(response))
            .map_err(|e| KvError::Store(e.to_string()))?;
        debug!(key = %key, results = response.results.len(), "Caching search response");
        self.store.set(&key, &payload, Some(self.ttl))
    }

    /// Evict every cached page keyed by `term`.
    pub fn invalidate_term(&self, term: &str) -> Result<u64, KvError> {
        invalidate_term(self.store.as_ref(), term)
    }
}

/// Delete all search cache entries whose key was derived from `term`.
/// Used by the synonym write path, which must invalidate synchronously.
pub fn invalidate_term(store: &dyn KvStore, term: &str) -> Result<u64, KvError> {
    let pattern = format!("{}:{}:*", SEARCH_PREFIX, term.to_lowercase());
    let deleted = store.del_matching(&pattern)?;
    if deleted > 0 {
        debug!(term = term, deleted = deleted, "Invalidated search cache entries");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::MemoryKvStore;
    use chrono::TimeZone;

    fn sample_response(date: Option<DateTime<Utc>>) -> SearchResponse {
        SearchResponse {
            results: vec![SearchResult {
                id: "b0000001".to_string(),
                title: "Gladiators".to_string(),
                channel: Some("BBC One".to_string()),
                kind: MediaKind::Tv,
                series: Some(1),
                episode: Some(3),
                episode_title: None,
                size_bytes: Some(900_000_000),
                publish_date: date,
                request: SourceRequest {
                    term: "gladiators".to_string(),
                    raw_line: None,
                },
            }],
            facets: vec![],
            pagination: Pagination {
                page: 1,
                total_pages: 1,
                total_results: 1,
            },
        }
    }

    fn cache() -> SearchResultCache {
        SearchResultCache::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(300))
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = cache();
        let got = cache.get("nothing", 1, &SearchFilters::default()).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn test_publish_date_round_trips_to_same_instant() {
        let cache = cache();
        let date = Utc.with_ymd_and_hms(2024, 6, 15, 21, 30, 0).unwrap();
        let filters = SearchFilters::default();
        cache
            .set("gladiators", 1, &filters, &sample_response(Some(date)))
            .unwrap();

        let got = cache.get("gladiators", 1, &filters).unwrap().unwrap();
        assert_eq!(got.results[0].publish_date, Some(date));
    }

    #[test]
    fn test_key_is_case_insensitive_on_term() {
        let cache = cache();
        let filters = SearchFilters::default();
        cache
            .set("Gladiators", 1, &filters, &sample_response(None))
            .unwrap();
        let got = cache.get("gladiators", 1, &filters).unwrap();
        assert!(got.is_some());
    }

    #[test]
    fn test_different_filters_are_distinct_entries() {
        let cache = cache();
        let without = SearchFilters::default();
        let with = SearchFilters {
            season: Some(1),
            ..Default::default()
        };
        cache
            .set("gladiators", 1, &without, &sample_response(None))
            .unwrap();
        assert!(cache.get("gladiators", 1, &with).unwrap().is_none());
    }

    #[test]
    fn test_invalidate_term_evicts_all_pages() {
        let cache = cache();
        let filters = SearchFilters::default();
        cache
            .set("doctor who", 1, &filters, &sample_response(None))
            .unwrap();
        cache
            .set("doctor who", 2, &filters, &sample_response(None))
            .unwrap();
        cache
            .set("gladiators", 1, &filters, &sample_response(None))
            .unwrap();

        let deleted = cache.invalidate_term("Doctor Who").unwrap();
        assert_eq!(deleted, 2);
        assert!(cache.get("doctor who", 1, &filters).unwrap().is_none());
        assert!(cache.get("gladiators", 1, &filters).unwrap().is_some());
    }

    #[test]
    fn test_corrupt_entry_is_evicted_not_propagated() {
        let store = Arc::new(MemoryKvStore::new());
        let cache = SearchResultCache::new(store.clone(), Duration::from_secs(300));
        let filters = SearchFilters::default();
        store.set("search:bad:1:sec", "{not json", None).unwrap();

        let got = cache.get("bad", 1, &filters).unwrap();
        assert!(got.is_none());
        assert!(store.get("search:bad:1:sec").unwrap().is_none());
    }
}
