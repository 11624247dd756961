//! Operator endpoints for an existing integration.
//!
//! Every call is authenticated with the integration's own API key in
//! `x-api-key`. Rotating the key invalidates the old one immediately.
//!
//! - `GET /api/integrations/:id`
//! - `POST /api/integrations/:id/activate`
//! - `POST /api/integrations/:id/deactivate`
//! - `POST /api/integrations/:id/rotate-key`
//! - `PUT /api/integrations/:id/policy`
//! - `DELETE /api/integrations/:id`

pub mod dto;
mod handlers;
mod routes;

pub use routes::integration_routes;

pub const API_KEY_HEADER: &str = "x-api-key";
