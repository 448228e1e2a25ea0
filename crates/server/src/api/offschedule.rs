//! Off-schedule programme API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use catcharr_core::{OffScheduleDef, OffScheduleError, SearchResult};

use crate::state::AppState;

/// Request body for registering a programme
#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    /// Catalogue page URL the programme id is resolved from.
    pub url: String,
    /// Display name; also the search term the items answer to.
    pub name: String,
}

/// Request body for renaming a programme
#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ProgrammeResponse {
    #[serde(flatten)]
    pub def: OffScheduleDef,
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub def: OffScheduleDef,
    pub item_count: usize,
}

#[derive(Debug, Serialize)]
pub struct OffScheduleErrorResponse {
    pub error: String,
}

fn error_response(e: OffScheduleError) -> (StatusCode, Json<OffScheduleErrorResponse>) {
    let status = match &e {
        OffScheduleError::NotFound(_) => StatusCode::NOT_FOUND,
        OffScheduleError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(OffScheduleErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub async fn list_programmes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OffScheduleDef>>, impl IntoResponse> {
    state
        .offschedule()
        .list()
        .map(Json)
        .map_err(error_response)
}

pub async fn register_programme(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<OffScheduleDef>), impl IntoResponse> {
    if body.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(OffScheduleErrorResponse {
                error: "name must be non-empty".to_string(),
            }),
        ));
    }
    match state.offschedule().register(&body.url, &body.name).await {
        Ok(def) => Ok((StatusCode::CREATED, Json(def))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_programme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProgrammeResponse>, (StatusCode, Json<OffScheduleErrorResponse>)> {
    let def = state.offschedule().get(&id).map_err(error_response)?;
    let items = state
        .offschedule()
        .items(&def.name)
        .map_err(error_response)?;
    Ok(Json(ProgrammeResponse { def, items }))
}

pub async fn remove_programme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, impl IntoResponse> {
    match state.offschedule().remove(&id) {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(OffScheduleErrorResponse {
                error: format!("No off-schedule programme with id {}", id),
            }),
        )),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn refresh_programme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<OffScheduleErrorResponse>)> {
    let mut def = state.offschedule().get(&id).map_err(error_response)?;
    let item_count = state
        .offschedule()
        .refresh(&mut def)
        .await
        .map_err(error_response)?;
    Ok(Json(RefreshResponse { def, item_count }))
}

pub async fn rename_programme(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> Result<Json<OffScheduleDef>, impl IntoResponse> {
    if body.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(OffScheduleErrorResponse {
                error: "name must be non-empty".to_string(),
            }),
        ));
    }
    state
        .offschedule()
        .rename(&id, &body.name)
        .map(Json)
        .map_err(error_response)
}
