//! Search API handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use catcharr_core::{SearchFilters, SearchResponse};

use crate::state::AppState;

/// Query parameters for a search request
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// The search term. `*` requests the full feed.
    pub q: String,
    /// 1-based result page.
    pub page: Option<usize>,
    /// Requested series number.
    pub season: Option<u32>,
    /// Requested episode number.
    pub episode: Option<u32>,
    /// Comma-separated category filter values.
    pub categories: Option<String>,
}

/// Run a search. Upstream failures surface as an empty result page, never
/// as an error status.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResponse> {
    let filters = SearchFilters {
        season: params.season,
        episode: params.episode,
        categories: params
            .categories
            .as_deref()
            .map(|c| {
                c.split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };
    let page = params.page.unwrap_or(1).max(1);
    let response = state.resolver().search(&params.q, page, &filters).await;
    Json(response)
}
