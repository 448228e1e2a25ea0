//! Synonym API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use catcharr_core::{synonyms::SynonymError, Synonym};

use crate::state::AppState;

/// Request body for creating or updating a synonym
#[derive(Debug, Deserialize)]
pub struct UpsertSynonymBody {
    /// Existing id for an update; omit to create.
    #[serde(default)]
    pub id: Option<String>,
    /// The title as searched for.
    pub from: String,
    /// The title the upstream catalogue knows.
    pub target: String,
    /// Comma-separated terms the engines must exclude.
    #[serde(default)]
    pub exemptions: String,
    /// Added to the searched series number before matching upstream.
    #[serde(default)]
    pub season_offset: i32,
}

#[derive(Debug, Serialize)]
pub struct SynonymErrorResponse {
    pub error: String,
}

fn error_response(e: SynonymError) -> (StatusCode, Json<SynonymErrorResponse>) {
    let status = match &e {
        SynonymError::NotFound(_) => StatusCode::NOT_FOUND,
        SynonymError::Invalid(_) => StatusCode::BAD_REQUEST,
        SynonymError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(SynonymErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub async fn list_synonyms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Synonym>>, impl IntoResponse> {
    state.synonyms().list().map(Json).map_err(error_response)
}

pub async fn upsert_synonym(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertSynonymBody>,
) -> Result<(StatusCode, Json<Synonym>), impl IntoResponse> {
    let creating = body.id.is_none();
    let synonym = Synonym {
        id: body.id.unwrap_or_default(),
        from: body.from,
        target: body.target,
        exemptions: body.exemptions,
        season_offset: body.season_offset,
    };
    match state.synonyms().upsert(synonym) {
        Ok(stored) => {
            let status = if creating {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((status, Json(stored)))
        }
        Err(e) => Err(error_response(e)),
    }
}

pub async fn delete_synonym(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, impl IntoResponse> {
    match state.synonyms().delete(&id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(error_response(e)),
    }
}
