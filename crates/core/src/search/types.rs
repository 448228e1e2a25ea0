//! Types for the catch-up search system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::synonyms::Synonym;

/// Media kind of a search result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Tv,
    Movie,
    Unknown,
}

impl MediaKind {
    /// Returns the string representation for API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Tv => "tv",
            MediaKind::Movie => "movie",
            MediaKind::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tv" => Some(MediaKind::Tv),
            "movie" => Some(MediaKind::Movie),
            "unknown" => Some(MediaKind::Unknown),
            _ => None,
        }
    }
}

/// The request a result was produced for, kept for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRequest {
    /// The resolved term the engine actually searched with.
    pub term: String,
    /// Raw record the result was parsed from (CLI engine only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_line: Option<String>,
}

/// A single downloadable item.
///
/// Identity is `id` (the upstream content identifier); engines do not
/// guarantee uniqueness within a page, so merging layers deduplicate by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Opaque content identifier (upstream programme id).
    pub id: String,
    /// Programme title.
    pub title: String,
    /// Broadcasting channel, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// TV / movie / unknown.
    pub kind: MediaKind,
    /// Series number, if the title or details carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<u32>,
    /// Episode number within the series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Episode title, if distinct from the programme title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_title: Option<String>,
    /// Estimated download size in bytes (runtime x quality size factor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// First broadcast / availability date. Absent for live or unknown
    /// content; future dates are filtered at the resolution boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,
    /// Provenance of this result.
    pub request: SourceRequest,
}

/// One value of a facet dimension, with its occurrence count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacetValue {
    pub value: String,
    pub count: usize,
}

/// A named filter dimension offered alongside results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facet {
    /// Dimension name: "category", "channel" or "type".
    pub name: String,
    /// Candidate values, sorted descending by count, truncated.
    pub values: Vec<FacetValue>,
}

/// Pagination computed over the post-expansion result list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub total_pages: usize,
    pub total_results: usize,
}

/// A page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub facets: Vec<Facet>,
    pub pagination: Pagination,
}

impl SearchResponse {
    /// An empty response for page 1 (the swallow-to-empty error policy).
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            facets: Vec::new(),
            pagination: Pagination {
                page: 1,
                total_pages: 0,
                total_results: 0,
            },
        }
    }
}

/// Requested filter facets for a search call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    /// Requested series (season) number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    /// Requested episode number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Requested category values (empty = all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl SearchFilters {
    /// Deterministic token for cache key derivation.
    pub fn cache_token(&self) -> String {
        let mut categories = self.categories.clone();
        categories.sort();
        format!(
            "s{}e{}c{}",
            self.season.map(|s| s.to_string()).unwrap_or_default(),
            self.episode.map(|e| e.to_string()).unwrap_or_default(),
            categories.join(",").to_lowercase()
        )
    }

    /// Whether a result satisfies the season/episode constraint.
    pub fn matches_episode(&self, series: Option<u32>, episode: Option<u32>) -> bool {
        if let Some(season) = self.season {
            if series != Some(season) {
                return false;
            }
        }
        if let Some(wanted) = self.episode {
            if episode != Some(wanted) {
                return false;
            }
        }
        true
    }
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("CLI search tool failed with exit code {0}")]
    CliFailed(i32),

    #[error("CLI search tool could not be spawned: {0}")]
    CliSpawn(String),

    #[error("cache error: {0}")]
    Cache(#[from] crate::kvstore::KvError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A search strategy. Exactly two implementations exist: the native
/// upstream-API engine and the CLI-driven fallback engine. Selection lives
/// in the resolution layer, not here.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Execute a search for an already-resolved term.
    async fn search(
        &self,
        term: &str,
        synonym: Option<&Synonym>,
        page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError>;
}
