use axum::routing::{get, post, put};
use axum::Router;

use super::handlers::{
    activate, deactivate, delete_integration, get_integration, rotate_key, update_policy,
};
use crate::adapters::http::state::AppState;

/// Mounted at `/api/integrations`.
pub fn integration_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_integration).delete(delete_integration))
        .route("/:id/activate", post(activate))
        .route("/:id/deactivate", post(deactivate))
        .route("/:id/rotate-key", post(rotate_key))
        .route("/:id/policy", put(update_policy))
}
