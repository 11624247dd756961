use axum::routing::post;
use axum::Router;

use super::handlers::{platform_webhook, telegram_webhook};
use crate::adapters::http::state::AppState;

/// Mounted at `/webhooks`.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/platform", post(platform_webhook))
        .route("/telegram", post(telegram_webhook))
}
