//! Native search engine over the upstream catalogue API.
//!
//! Pipeline: catalogue search → category filter → facet extraction (over
//! the unranked candidates, so facet counts reflect what upstream returned)
//! → relevance re-rank → aggregate expansion (each brand or series expanded
//! at most once) → pagination over the expanded id list → detail fetch for
//! the visible page only → size estimation from runtime.
//!
//! Any upstream failure hands the whole call to the CLI engine; an empty
//! page from that path is indistinguishable from a masked outage, so the
//! handoff is logged and counted.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{QualityConfig, SearchConfig};
use crate::metrics;
use crate::reranker::{self, RerankDoc};
use crate::synonyms::Synonym;
use crate::upstream::{details_chunked, CatchupService, ProgrammeHit, UpstreamError};

use super::title::{infer_kind, parse_display_title};
use super::types::{
    Facet, FacetValue, Pagination, SearchEngine, SearchError, SearchFilters, SearchResponse,
    SearchResult, SourceRequest,
};

/// Facet dimensions are truncated to this many values.
pub const MAX_FACET_VALUES: usize = 10;

pub struct NativeEngine {
    api: Arc<dyn CatchupService>,
    fallback: Arc<dyn SearchEngine>,
    search_config: SearchConfig,
    quality: QualityConfig,
}

impl NativeEngine {
    pub fn new(
        api: Arc<dyn CatchupService>,
        fallback: Arc<dyn SearchEngine>,
        search_config: SearchConfig,
        quality: QualityConfig,
    ) -> Self {
        Self {
            api,
            fallback,
            search_config,
            quality,
        }
    }

    async fn search_native(
        &self,
        term: &str,
        page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, UpstreamError> {
        let hits = self.api.search(term).await?;
        let hits = filter_by_category(hits, &filters.categories);
        let facets = extract_facets(&hits);

        let docs: Vec<RerankDoc> = hits
            .iter()
            .map(|h| RerankDoc {
                id: h.id.clone(),
                text: h.title.clone(),
            })
            .collect();
        let order = reranker::rerank(term, &docs);
        let by_id: HashMap<&str, &ProgrammeHit> =
            hits.iter().map(|h| (h.id.as_str(), h)).collect();

        // Expand aggregates in relevance order; each aggregate once, each
        // episode id once.
        let mut expanded: Vec<String> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for id in &order {
            let Some(hit) = by_id.get(id.as_str()) else {
                continue;
            };
            if hit.is_aggregate() {
                for episode in self.api.episodes_of(&hit.id).await? {
                    if seen.insert(episode.id.clone()) {
                        expanded.push(episode.id);
                    }
                }
            } else if seen.insert(hit.id.clone()) {
                expanded.push(hit.id.clone());
            }
        }

        let per_page = self.search_config.results_per_page.max(1);
        let total_results = expanded.len();
        let total_pages = total_results.div_ceil(per_page);
        let page = page.max(1);
        let start = (page - 1) * per_page;
        let slice: &[String] = if start < expanded.len() {
            &expanded[start..(start + per_page).min(expanded.len())]
        } else {
            &[]
        };

        let details = details_chunked(self.api.as_ref(), slice).await;
        let size_factor = self.quality.active_size_factor();
        let results = details
            .into_iter()
            .map(|d| {
                let parsed = parse_display_title(&d.title);
                SearchResult {
                    id: d.id,
                    title: if parsed.show.is_empty() {
                        d.title.clone()
                    } else {
                        parsed.show.clone()
                    },
                    channel: d.channel,
                    kind: infer_kind(&parsed, d.category.as_deref()),
                    series: d.series.or(parsed.series),
                    episode: d.episode.or(parsed.episode),
                    episode_title: d.episode_title.or(parsed.episode_title),
                    size_bytes: d
                        .runtime_minutes
                        .map(|mins| (mins as f64 * size_factor * 1024.0 * 1024.0) as u64),
                    publish_date: d.first_broadcast,
                    request: SourceRequest {
                        term: term.to_string(),
                        raw_line: None,
                    },
                }
            })
            .collect();

        Ok(SearchResponse {
            results,
            facets,
            pagination: Pagination {
                page,
                total_pages,
                total_results,
            },
        })
    }
}

#[async_trait]
impl SearchEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    async fn search(
        &self,
        term: &str,
        synonym: Option<&Synonym>,
        page: usize,
        filters: &SearchFilters,
    ) -> Result<SearchResponse, SearchError> {
        metrics::SEARCHES_EXECUTED.with_label_values(&["native"]).inc();
        match self.search_native(term, page, filters).await {
            Ok(response) => Ok(response),
            Err(e) => {
                // An empty CLI result after this point may mask the outage.
                warn!(term = term, error = %e, "Upstream failed, delegating to CLI engine");
                metrics::ENGINE_FALLBACKS.inc();
                self.fallback.search(term, synonym, page, filters).await
            }
        }
    }
}

fn filter_by_category(hits: Vec<ProgrammeHit>, categories: &[String]) -> Vec<ProgrammeHit> {
    if categories.is_empty() {
        return hits;
    }
    let wanted: Vec<String> = categories.iter().map(|c| c.to_lowercase()).collect();
    hits.into_iter()
        .filter(|h| {
            h.categories
                .iter()
                .any(|c| wanted.contains(&c.to_lowercase()))
        })
        .collect()
}

fn extract_facets(hits: &[ProgrammeHit]) -> Vec<Facet> {
    let mut category_counts: HashMap<String, usize> = HashMap::new();
    let mut channel_counts: HashMap<String, usize> = HashMap::new();
    let mut type_counts: HashMap<String, usize> = HashMap::new();

    for hit in hits {
        for category in &hit.categories {
            *category_counts.entry(category.clone()).or_default() += 1;
        }
        if let Some(channel) = &hit.channel {
            *channel_counts.entry(channel.clone()).or_default() += 1;
        }
        let kind = match hit.kind {
            crate::upstream::ProgrammeKind::Brand => "brand",
            crate::upstream::ProgrammeKind::Series => "series",
            crate::upstream::ProgrammeKind::Episode => "episode",
        };
        *type_counts.entry(kind.to_string()).or_default() += 1;
    }

    let facet = |name: &str, counts: HashMap<String, usize>| {
        let mut values: Vec<FacetValue> = counts
            .into_iter()
            .map(|(value, count)| FacetValue { value, count })
            .collect();
        values.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));
        values.truncate(MAX_FACET_VALUES);
        Facet {
            name: name.to_string(),
            values,
        }
    };

    let facets = vec![
        facet("category", category_counts),
        facet("channel", channel_counts),
        facet("type", type_counts),
    ];
    debug!(
        categories = facets[0].values.len(),
        channels = facets[1].values.len(),
        "Extracted facets"
    );
    facets
}
