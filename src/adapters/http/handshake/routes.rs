//! Axum router configuration for the handshake endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    cancel, complete, confirm_identity, get_session, initiate, list_eligible_groups, select_group,
    select_tier,
};
use crate::adapters::http::state::AppState;

/// Mounted at `/api/handshake`.
pub fn handshake_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(initiate))
        .route("/:token", get(get_session))
        .route("/:token/identity", post(confirm_identity))
        .route("/:token/group", post(select_group))
        .route("/:token/tier", post(select_tier))
        .route("/:token/complete", post(complete))
        .route("/:token/cancel", post(cancel))
}

/// Mounted at `/api/groups`.
pub fn groups_routes() -> Router<AppState> {
    Router::new().route("/eligible", get(list_eligible_groups))
}
