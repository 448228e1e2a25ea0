//! Search resolution pipeline.
//!
//! Everything between an incoming query string and a final page of results:
//! embedded-token extraction, synonym resolution, the result cache, engine
//! selection, off-schedule augmentation, season/episode filtering and the
//! future-date gate. Engine failures never escape this layer; callers see
//! an empty response and the failure is logged and counted.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::cache::SearchResultCache;
use crate::metrics;
use crate::offschedule::OffScheduleCache;
use crate::synonyms::{resolve_term, SynonymStore};

use super::title::sxxeyy;
use super::types::{SearchEngine, SearchFilters, SearchResponse};

pub struct SearchResolver {
    synonyms: Arc<SynonymStore>,
    cache: SearchResultCache,
    native: Arc<dyn SearchEngine>,
    cli: Arc<dyn SearchEngine>,
    offschedule: Arc<OffScheduleCache>,
    native_search: bool,
}

impl SearchResolver {
    pub fn new(
        synonyms: Arc<SynonymStore>,
        cache: SearchResultCache,
        native: Arc<dyn SearchEngine>,
        cli: Arc<dyn SearchEngine>,
        offschedule: Arc<OffScheduleCache>,
        native_search: bool,
    ) -> Self {
        Self {
            synonyms,
            cache,
            native,
            cli,
            offschedule,
            native_search,
        }
    }

    /// Resolve a raw query into a page of results. Never fails: engine and
    /// cache errors degrade to an empty response.
    pub async fn search(
        &self,
        query: &str,
        page: usize,
        filters: &SearchFilters,
    ) -> SearchResponse {
        // Step 1: lift an embedded SxxEyy token out of the query string.
        let mut filters = filters.clone();
        let mut term = query.trim().to_string();
        if let Some((season, episode)) = sxxeyy(&term) {
            filters.season.get_or_insert(season);
            filters.episode.get_or_insert(episode);
            term = strip_sxxeyy(&term);
        }

        // Step 2: synonym resolution.
        let synonyms = match self.synonyms.list() {
            Ok(synonyms) => synonyms,
            Err(e) => {
                warn!(error = %e, "Failed to load synonyms, resolving without");
                Vec::new()
            }
        };
        let resolved = resolve_term(&term, filters.season.is_some(), &synonyms);

        // Step 3: a synonym's season offset shifts the requested season to
        // the upstream numbering.
        if let (Some(synonym), Some(season)) = (&resolved.synonym, filters.season) {
            if synonym.season_offset != 0 {
                let shifted = season as i64 + synonym.season_offset as i64;
                filters.season = Some(shifted.max(0) as u32);
            }
        }

        // Step 4: the cache.
        let mut response = match self.cache.get(&resolved.term, page, &filters) {
            Ok(Some(cached)) => {
                debug!(term = %resolved.term, page = page, "Search cache hit");
                metrics::SEARCH_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                cached
            }
            Ok(None) => {
                metrics::SEARCH_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
                match self.execute(&resolved.term, resolved.synonym.as_ref(), page, &filters).await {
                    Some(response) => {
                        if let Err(e) = self.cache.set(&resolved.term, page, &filters, &response) {
                            warn!(term = %resolved.term, error = %e, "Failed to cache search response");
                        }
                        response
                    }
                    None => return SearchResponse::empty(),
                }
            }
            Err(e) => {
                warn!(term = %resolved.term, error = %e, "Cache read failed, searching anyway");
                match self.execute(&resolved.term, resolved.synonym.as_ref(), page, &filters).await {
                    Some(response) => response,
                    None => return SearchResponse::empty(),
                }
            }
        };

        // Step 6: off-schedule augmentation on the native path. The CLI
        // engine merges these itself before its own pagination.
        if self.uses_native(&resolved.term) {
            self.augment_offschedule(&mut response, &resolved.term, &filters);
        }

        // Step 7: constraint and future-date filtering. Availability dates
        // in the future describe not-yet-broadcast episodes.
        let now = Utc::now();
        response.results.retain(|r| {
            filters.matches_episode(r.series, r.episode)
                && r.publish_date.map_or(true, |d| d <= now)
        });

        response
    }

    fn uses_native(&self, term: &str) -> bool {
        self.native_search && term != "*"
    }

    /// Step 5: engine selection and execution, with the swallow-to-empty
    /// policy.
    async fn execute(
        &self,
        term: &str,
        synonym: Option<&crate::synonyms::Synonym>,
        page: usize,
        filters: &SearchFilters,
    ) -> Option<SearchResponse> {
        let engine = if self.uses_native(term) {
            &self.native
        } else {
            &self.cli
        };
        match engine.search(term, synonym, page, filters).await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(term = term, engine = engine.name(), error = %e, "Search failed, returning empty");
                metrics::SEARCHES_SWALLOWED.inc();
                None
            }
        }
    }

    fn augment_offschedule(
        &self,
        response: &mut SearchResponse,
        term: &str,
        filters: &SearchFilters,
    ) {
        let extra = match self.offschedule.search(term) {
            Ok(extra) => extra,
            Err(e) => {
                warn!(term = term, error = %e, "Off-schedule lookup failed");
                return;
            }
        };
        for item in extra {
            if response.results.iter().all(|r| r.id != item.id)
                && filters.matches_episode(item.series, item.episode)
            {
                response.results.push(item);
            }
        }
    }
}

fn strip_sxxeyy(term: &str) -> String {
    use once_cell::sync::Lazy;
    use regex_lite::Regex;
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\bS[0-9]{1,3}\s*E[0-9]{1,3}\b").unwrap());
    RE.replace_all(term, "").trim().to_string()
}
