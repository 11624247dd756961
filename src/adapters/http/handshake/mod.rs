//! HTTP adapter for the connect handshake.
//!
//! - `POST /api/handshake` - start a session from temporary credentials
//! - `GET /api/handshake/:token` - current session view
//! - `POST /api/handshake/:token/identity` - login widget proof
//! - `POST /api/handshake/:token/group` - pick the destination group
//! - `POST /api/handshake/:token/tier` - pick the minimum tier
//! - `POST /api/handshake/:token/complete` - create the integration
//! - `POST /api/handshake/:token/cancel`
//! - `GET /api/groups/eligible` - groups the bot can gate

pub mod dto;
mod handlers;
mod routes;

pub use routes::{groups_routes, handshake_routes};
