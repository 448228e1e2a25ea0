//! History API handler.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use catcharr_core::HistoryEntry;

use crate::state::AppState;

/// Maximum allowed limit for history queries
const MAX_LIMIT: usize = 1000;

/// Default limit for history queries
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListHistoryParams {
    /// Maximum number of entries to return, newest first.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListHistoryResponse {
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct HistoryErrorResponse {
    pub error: String,
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListHistoryParams>,
) -> Result<Json<ListHistoryResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    match state.history().list(limit) {
        Ok(entries) => Ok(Json(ListHistoryResponse { entries })),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HistoryErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
