use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, history, middleware, offschedule, queue, search, synonyms};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Search
        .route("/search", get(search::search))
        // Download queue
        .route("/queue", get(queue::list_queue))
        .route("/queue", post(queue::add_download))
        .route("/queue/{pid}", delete(queue::cancel_download))
        // History
        .route("/history", get(history::list_history))
        // Off-schedule programmes
        .route("/offschedule", get(offschedule::list_programmes))
        .route("/offschedule", post(offschedule::register_programme))
        .route("/offschedule/{id}", get(offschedule::get_programme))
        .route("/offschedule/{id}", delete(offschedule::remove_programme))
        .route("/offschedule/{id}/refresh", post(offschedule::refresh_programme))
        .route("/offschedule/{id}/rename", post(offschedule::rename_programme))
        // Synonyms
        .route("/synonyms", get(synonyms::list_synonyms))
        .route("/synonyms", post(synonyms::upsert_synonym))
        .route("/synonyms/{id}", delete(synonyms::delete_synonym))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
