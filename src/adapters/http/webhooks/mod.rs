//! Inbound webhooks.
//!
//! - `POST /webhooks/platform` - crowdfunding platform events, HMAC-signed
//! - `POST /webhooks/telegram` - pushed bot updates, checked against the
//!   secret registered with `setWebhook`

mod handlers;
mod routes;

pub use routes::webhook_routes;

/// Header Telegram sets to the secret given at `setWebhook`.
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
