// src/api/router.rs
// HTTP router composition for the dashboard API.

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{cron, health, list_outputs, list_projects, list_tasks, refresh, webhook};
use crate::state::AppState;

/// The full application: API routes nested under /api with CORS for the
/// dashboard origin and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    Router::new()
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Health
        .route("/health", get(health))
        // Collections
        .route("/projects", get(list_projects))
        .route("/tasks", get(list_tasks))
        .route("/outputs", get(list_outputs))
        // Sync triggers
        .route("/refresh", post(refresh))
        .route("/webhook", post(webhook))
        .route("/cron", get(cron))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match origin.parse::<HeaderValue>() {
        Ok(value) if origin != "*" => layer.allow_origin(value),
        _ => layer.allow_origin(Any),
    }
}
