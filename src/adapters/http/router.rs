//! Top-level router: every route group, `/health`, tracing and timeout.

use std::time::Duration;

use axum::extract::Json;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handshake::{groups_routes, handshake_routes};
use super::integrations::integration_routes;
use super::state::AppState;
use super::webhooks::webhook_routes;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .nest("/handshake", handshake_routes())
        .nest("/groups", groups_routes())
        .nest("/integrations", integration_routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest("/webhooks", webhook_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
