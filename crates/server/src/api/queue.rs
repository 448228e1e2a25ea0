//! Download queue API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use catcharr_core::{MediaKind, QueueEntry, QueueError};

use crate::state::AppState;

/// Request body for adding a download
#[derive(Debug, Deserialize)]
pub struct AddDownloadBody {
    /// Upstream programme id.
    pub pid: String,
    /// Base name the finished artifact is delivered under.
    pub nzb_name: String,
    #[serde(default = "default_kind")]
    pub kind: MediaKind,
    /// Caller-assigned correlation id.
    pub app_id: Option<String>,
}

fn default_kind() -> MediaKind {
    MediaKind::Tv
}

/// Query parameters for cancelling a download
#[derive(Debug, Deserialize)]
pub struct CancelParams {
    /// Record the cancellation in history (default: true).
    pub archive: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Serialize)]
pub struct QueueErrorResponse {
    pub error: String,
}

pub async fn list_queue(State(state): State<Arc<AppState>>) -> Json<QueueListResponse> {
    Json(QueueListResponse {
        entries: state.queue().list().await,
    })
}

pub async fn add_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddDownloadBody>,
) -> Result<(StatusCode, Json<QueueEntry>), impl IntoResponse> {
    match state
        .queue()
        .enqueue(&body.pid, &body.nzb_name, body.kind, body.app_id)
        .await
    {
        Ok(entry) => Ok((StatusCode::CREATED, Json(entry))),
        Err(e @ QueueError::Duplicate(_)) => Err((
            StatusCode::CONFLICT,
            Json(QueueErrorResponse {
                error: e.to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(QueueErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<CancelParams>,
) -> Result<StatusCode, impl IntoResponse> {
    let archive = params.archive.unwrap_or(true);
    match state.queue().cancel(&pid, archive).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(QueueErrorResponse {
                error: format!("No queued download for {}", pid),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(QueueErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
