//! Upstream catch-up catalogue client.
//!
//! The native search engine talks to the broadcaster's catalogue JSON API
//! through the [`CatchupService`] trait so tests can substitute a mock.
//! Detail lookups are fetched in fixed-size sequential batches: the
//! catalogue rate-limits aggressively and a fully parallel fan-out gets the
//! instance blocked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;

/// Detail lookups run in sequential batches of this size.
pub const DETAILS_CHUNK: usize = 5;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Failed to connect to upstream: {0}")]
    ConnectionFailed(String),
    #[error("Upstream API error: {0}")]
    ApiError(String),
}

/// Classification of a catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgrammeKind {
    Brand,
    Series,
    Episode,
}

/// A raw search hit from the catalogue. Brands and series are aggregates
/// that the native engine expands before presenting results.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgrammeHit {
    pub id: String,
    pub title: String,
    pub kind: ProgrammeKind,
    pub channel: Option<String>,
    pub categories: Vec<String>,
}

impl ProgrammeHit {
    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, ProgrammeKind::Brand | ProgrammeKind::Series)
    }
}

/// A bare reference to a programme, as returned by aggregate expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgrammeRef {
    pub id: String,
    pub title: String,
}

/// Full details for a single programme.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgrammeDetails {
    pub id: String,
    pub title: String,
    pub kind: ProgrammeKind,
    pub channel: Option<String>,
    pub category: Option<String>,
    pub series: Option<u32>,
    pub episode: Option<u32>,
    pub episode_title: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub first_broadcast: Option<DateTime<Utc>>,
}

/// The catalogue operations the search engines depend on.
#[async_trait]
pub trait CatchupService: Send + Sync {
    /// Free-text search over the catalogue.
    async fn search(&self, term: &str) -> Result<Vec<ProgrammeHit>, UpstreamError>;

    /// Expand an aggregate (brand or series) into its member programmes.
    async fn episodes_of(&self, id: &str) -> Result<Vec<ProgrammeRef>, UpstreamError>;

    /// Full details for one programme. Unknown ids yield `None`.
    async fn details(&self, id: &str) -> Result<Option<ProgrammeDetails>, UpstreamError>;

    /// Extract the programme id from a player URL, if it carries one.
    fn resolve_url(&self, url: &str) -> Option<String> {
        pid_from_url(url)
    }
}

/// Fetch details for `ids` in sequential batches of [`DETAILS_CHUNK`],
/// parallel within each batch. Individual failures and unknown ids are
/// logged and skipped.
pub async fn details_chunked(
    api: &dyn CatchupService,
    ids: &[String],
) -> Vec<ProgrammeDetails> {
    let mut all = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(DETAILS_CHUNK) {
        let batch = futures::future::join_all(chunk.iter().map(|id| api.details(id))).await;
        for (id, result) in chunk.iter().zip(batch) {
            match result {
                Ok(Some(details)) => all.push(details),
                Ok(None) => debug!(id = %id, "Programme vanished from catalogue"),
                Err(e) => warn!(id = %id, error = %e, "Detail lookup failed"),
            }
        }
    }
    all
}

static PID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/([a-z][a-z0-9]{7,})(?:/|\?|$)").unwrap());

/// Pull a programme id out of a player URL path.
pub fn pid_from_url(url: &str) -> Option<String> {
    PID_SEGMENT
        .captures_iter(url)
        .last()
        .map(|c| c[1].to_string())
}

/// HTTP implementation against the catalogue's JSON API.
pub struct HttpCatchupService {
    client: Client,
    base_url: String,
}

impl HttpCatchupService {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, term: &str) -> String {
        format!("{}/search?q={}", self.base_url, urlencoding::encode(term))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, UpstreamError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else if e.is_connect() {
                UpstreamError::ConnectionFailed(e.to_string())
            } else {
                UpstreamError::ApiError(e.to_string())
            }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::ApiError(format!("Failed to parse response: {}", e)))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl CatchupService for HttpCatchupService {
    async fn search(&self, term: &str) -> Result<Vec<ProgrammeHit>, UpstreamError> {
        let url = self.search_url(term);
        debug!(term = term, "Searching upstream catalogue");

        let envelope: SearchEnvelope = self
            .get_json(&url)
            .await?
            .unwrap_or(SearchEnvelope { results: vec![] });

        debug!(term = term, hits = envelope.results.len(), "Upstream search complete");
        Ok(envelope
            .results
            .into_iter()
            .map(|r| ProgrammeHit {
                id: r.id,
                title: r.title,
                kind: r.kind,
                channel: r.channel,
                categories: r.categories,
            })
            .collect())
    }

    async fn episodes_of(&self, id: &str) -> Result<Vec<ProgrammeRef>, UpstreamError> {
        let url = format!("{}/programmes/{}/episodes", self.base_url, id);
        let envelope: EpisodesEnvelope = self
            .get_json(&url)
            .await?
            .unwrap_or(EpisodesEnvelope { episodes: vec![] });
        Ok(envelope
            .episodes
            .into_iter()
            .map(|e| ProgrammeRef {
                id: e.id,
                title: e.title,
            })
            .collect())
    }

    async fn details(&self, id: &str) -> Result<Option<ProgrammeDetails>, UpstreamError> {
        let url = format!("{}/programmes/{}", self.base_url, id);
        let Some(payload) = self.get_json::<DetailsPayload>(&url).await? else {
            return Ok(None);
        };
        Ok(Some(ProgrammeDetails {
            id: payload.id,
            title: payload.title,
            kind: payload.kind,
            channel: payload.channel,
            category: payload.category,
            series: payload.series,
            episode: payload.episode,
            episode_title: payload.episode_title,
            runtime_minutes: payload.runtime_minutes,
            first_broadcast: payload
                .first_broadcast
                .as_deref()
                .and_then(parse_upstream_date),
        }))
    }
}

/// Upstream dates arrive as RFC 3339, occasionally without a zone.
fn parse_upstream_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

// Catalogue API response types.
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<HitPayload>,
}

#[derive(Debug, Deserialize)]
struct HitPayload {
    id: String,
    title: String,
    #[serde(rename = "type")]
    kind: ProgrammeKind,
    channel: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodesEnvelope {
    #[serde(default)]
    episodes: Vec<RefPayload>,
}

#[derive(Debug, Deserialize)]
struct RefPayload {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct DetailsPayload {
    id: String,
    title: String,
    #[serde(rename = "type")]
    kind: ProgrammeKind,
    channel: Option<String>,
    category: Option<String>,
    series: Option<u32>,
    episode: Option<u32>,
    episode_title: Option<String>,
    runtime_minutes: Option<u32>,
    first_broadcast: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_pid_from_episode_url() {
        assert_eq!(
            pid_from_url("https://player.example.com/episode/m001xyz0"),
            Some("m001xyz0".to_string())
        );
    }

    #[test]
    fn test_pid_from_url_takes_last_segment() {
        assert_eq!(
            pid_from_url("https://player.example.com/brand/b0070001/episode/m0012abc"),
            Some("m0012abc".to_string())
        );
    }

    #[test]
    fn test_pid_from_url_ignores_short_segments() {
        assert_eq!(pid_from_url("https://player.example.com/tv/live"), None);
    }

    #[test]
    fn test_parse_upstream_date_rfc3339() {
        let date = parse_upstream_date("2024-06-15T21:00:00Z").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 6, 15));
    }

    #[test]
    fn test_parse_upstream_date_no_timezone() {
        assert!(parse_upstream_date("2024-06-15T21:00:00").is_some());
    }

    #[test]
    fn test_parse_upstream_date_invalid() {
        assert!(parse_upstream_date("next tuesday").is_none());
    }

    #[test]
    fn test_search_url_encodes_term() {
        let config = UpstreamConfig {
            base_url: "http://localhost:9000/".to_string(),
            timeout_secs: 30,
        };
        let svc = HttpCatchupService::new(&config).unwrap();
        assert_eq!(
            svc.search_url("doctor who"),
            "http://localhost:9000/search?q=doctor%20who"
        );
    }

    #[test]
    fn test_hit_payload_deserializes_kind() {
        let raw = r#"{"id":"b0070001","title":"Gladiators","type":"brand","channel":"BBC One"}"#;
        let hit: HitPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(hit.kind, ProgrammeKind::Brand);
        assert!(hit.categories.is_empty());
    }
}
