//! HTTP adapter - the axum surface.
//!
//! - [`handshake`] - the maker's connect flow and eligible groups
//! - [`integrations`] - operator actions, keyed by the integration's API key
//! - [`webhooks`] - platform events and pushed Telegram updates
//!
//! Errors leave as `{"code", "message"}` through [`ApiError`].

pub mod error;
pub mod handshake;
pub mod integrations;
mod router;
pub mod state;
pub mod webhooks;

pub use error::{ApiError, ErrorResponse};
pub use router::{app_router, health};
pub use state::AppState;
