//! Off-schedule episode cache.
//!
//! Some programmes never appear in catalogue search even though their
//! episodes are playable from a direct URL. Users register those URLs with
//! a display name; the cache periodically expands each registration into
//! its episode list and serves them alongside CLI search results. Item
//! blobs carry a long TTL so a registration that stops refreshing ages out
//! on its own.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CachedResult;
use crate::kvstore::{KvError, KvStore};
use crate::reranker::{self, RerankDoc};
use crate::search::{MediaKind, SearchResult, SourceRequest};
use crate::search::title::{infer_kind, parse_display_title};
use crate::upstream::{details_chunked, CatchupService, UpstreamError};

const DEF_PREFIX: &str = "offschedule:def";
const ITEMS_PREFIX: &str = "offschedule:items";
const ITEMS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum OffScheduleError {
    #[error("Store error: {0}")]
    Store(#[from] KvError),
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("Registration not found: {0}")]
    NotFound(String),
    #[error("No programme id in URL: {0}")]
    InvalidUrl(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// A registered off-schedule programme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffScheduleDef {
    pub id: String,
    pub url: String,
    pub name: String,
    pub last_refreshed: Option<DateTime<Utc>>,
}

pub struct OffScheduleCache {
    store: Arc<dyn KvStore>,
    api: Arc<dyn CatchupService>,
}

impl OffScheduleCache {
    pub fn new(store: Arc<dyn KvStore>, api: Arc<dyn CatchupService>) -> Self {
        Self { store, api }
    }

    fn def_key(id: &str) -> String {
        format!("{}:{}", DEF_PREFIX, id)
    }

    fn items_key(name: &str) -> String {
        format!("{}:{}", ITEMS_PREFIX, name.to_lowercase())
    }

    /// Register a player URL under a display name and populate its episode
    /// list immediately.
    pub async fn register(
        &self,
        url: &str,
        name: &str,
    ) -> Result<OffScheduleDef, OffScheduleError> {
        if self.api.resolve_url(url).is_none() {
            return Err(OffScheduleError::InvalidUrl(url.to_string()));
        }

        let mut def = OffScheduleDef {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            name: name.trim().to_string(),
            last_refreshed: None,
        };
        self.save_def(&def)?;
        let items = self.refresh(&mut def).await?;
        info!(name = %def.name, items = items, "Registered off-schedule programme");
        Ok(def)
    }

    pub fn list(&self) -> Result<Vec<OffScheduleDef>, OffScheduleError> {
        let keys = self.store.scan_keys(&format!("{}:*", DEF_PREFIX))?;
        let mut defs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = self.store.get(&key)? {
                let def: OffScheduleDef = serde_json::from_str(&raw)
                    .map_err(|e| OffScheduleError::Encoding(e.to_string()))?;
                defs.push(def);
            }
        }
        defs.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(defs)
    }

    pub fn get(&self, id: &str) -> Result<OffScheduleDef, OffScheduleError> {
        let raw = self
            .store
            .get(&Self::def_key(id))?
            .ok_or_else(|| OffScheduleError::NotFound(id.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| OffScheduleError::Encoding(e.to_string()))
    }

    /// Remove a registration and its cached items. Unknown ids are not an
    /// error.
    pub fn remove(&self, id: &str) -> Result<bool, OffScheduleError> {
        let Ok(def) = self.get(id) else {
            return Ok(false);
        };
        self.store.del(&Self::items_key(&def.name))?;
        self.store.del(&Self::def_key(id))?;
        info!(name = %def.name, "Removed off-schedule programme");
        Ok(true)
    }

    /// Change a registration's display name, migrating the cached item blob
    /// to the key derived from the new name.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<OffScheduleDef, OffScheduleError> {
        let mut def = self.get(id)?;
        let old_key = Self::items_key(&def.name);
        def.name = new_name.trim().to_string();

        if let Some(items) = self.store.get(&old_key)? {
            // Items are retained under the new key; the TTL restarts.
            self.store
                .set(&Self::items_key(&def.name), &items, Some(ITEMS_TTL))?;
        }
        self.store.del(&old_key)?;
        self.save_def(&def)?;
        info!(id = %id, name = %def.name, "Renamed off-schedule programme");
        Ok(def)
    }

    /// Re-expand a registration into its episode list and store it.
    /// Returns the number of items cached.
    pub async fn refresh(&self, def: &mut OffScheduleDef) -> Result<usize, OffScheduleError> {
        let pid = self
            .api
            .resolve_url(&def.url)
            .ok_or_else(|| OffScheduleError::InvalidUrl(def.url.clone()))?;

        let refs = self.api.episodes_of(&pid).await?;
        let ids: Vec<String> = refs.iter().map(|r| r.id.clone()).collect();
        let details = details_chunked(self.api.as_ref(), &ids).await;

        // Episodes without a broadcast date cannot be dated for callers and
        // are dropped rather than cached.
        let items: Vec<CachedResult> = details
            .iter()
            .filter(|d| d.first_broadcast.is_some())
            .map(|d| {
                let parsed = parse_display_title(&d.title);
                let result = SearchResult {
                    id: d.id.clone(),
                    title: def.name.clone(),
                    channel: d.channel.clone(),
                    kind: match infer_kind(&parsed, d.category.as_deref()) {
                        MediaKind::Unknown => MediaKind::Tv,
                        kind => kind,
                    },
                    series: d.series.or(parsed.series),
                    episode: d.episode.or(parsed.episode),
                    episode_title: d.episode_title.clone().or(parsed.episode_title),
                    size_bytes: None,
                    publish_date: d.first_broadcast,
                    request: SourceRequest {
                        term: def.name.clone(),
                        raw_line: None,
                    },
                };
                CachedResult::from(&result)
            })
            .collect();

        let payload = serde_json::to_string(&items)
            .map_err(|e| OffScheduleError::Encoding(e.to_string()))?;
        self.store
            .set(&Self::items_key(&def.name), &payload, Some(ITEMS_TTL))?;

        def.last_refreshed = Some(Utc::now());
        self.save_def(def)?;
        debug!(name = %def.name, items = items.len(), "Refreshed off-schedule items");
        Ok(items.len())
    }

    /// Cached episodes for one display name.
    pub fn items(&self, name: &str) -> Result<Vec<SearchResult>, OffScheduleError> {
        let Some(raw) = self.store.get(&Self::items_key(name))? else {
            return Ok(Vec::new());
        };
        let items: Vec<CachedResult> =
            serde_json::from_str(&raw).map_err(|e| OffScheduleError::Encoding(e.to_string()))?;
        Ok(items.into_iter().map(CachedResult::into_result).collect())
    }

    /// Episodes of every registration whose display name matches `term`.
    pub fn search(&self, term: &str) -> Result<Vec<SearchResult>, OffScheduleError> {
        let defs = self.list()?;
        let docs: Vec<RerankDoc> = defs
            .iter()
            .map(|d| RerankDoc {
                id: d.id.clone(),
                text: d.name.clone(),
            })
            .collect();

        let mut results = Vec::new();
        for id in reranker::matches(term, &docs) {
            if let Some(def) = defs.iter().find(|d| d.id == id) {
                results.extend(self.items(&def.name)?);
            }
        }
        Ok(results)
    }

    /// The registration covering `url`, if any.
    pub fn for_url(&self, url: &str) -> Result<Option<OffScheduleDef>, OffScheduleError> {
        let target = self.api.resolve_url(url);
        Ok(self
            .list()?
            .into_iter()
            .find(|d| d.url == url || (target.is_some() && self.api.resolve_url(&d.url) == target)))
    }

    fn save_def(&self, def: &OffScheduleDef) -> Result<(), OffScheduleError> {
        let payload =
            serde_json::to_string(def).map_err(|e| OffScheduleError::Encoding(e.to_string()))?;
        self.store.set(&Self::def_key(&def.id), &payload, None)?;
        Ok(())
    }
}

/// Spawn the periodic refresh sweep. Every `interval` each registration is
/// re-expanded; individual failures are logged and the sweep moves on.
pub fn spawn_refresh_loop(
    cache: Arc<OffScheduleCache>,
    interval: Duration,
    shutdown_tx: &broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        info!("Off-schedule refresh loop started");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Off-schedule refresh loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let defs = match cache.list() {
                        Ok(defs) => defs,
                        Err(e) => {
                            warn!("Failed to list off-schedule programmes: {}", e);
                            continue;
                        }
                    };
                    for mut def in defs {
                        if let Err(e) = cache.refresh(&mut def).await {
                            warn!(name = %def.name, "Off-schedule refresh failed: {}", e);
                        }
                    }
                }
            }
        }
        info!("Off-schedule refresh loop stopped");
    })
}
