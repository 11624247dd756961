//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - repositories, the campaign catalog and the journal
//! - `redis` - credential exchange, job queue, schedule ledger
//! - `rate_limiter` - provider quotas and the throttling decorator
//! - `subscription_api` - the platform's supporter API over HTTP
//! - `telegram` - gateway, polling and update conversion
//! - `http` - the axum surface
//! - `memory` - in-memory versions of every port

pub mod http;
pub mod memory;
pub mod postgres;
pub mod rate_limiter;
pub mod redis;
pub mod subscription_api;
pub mod telegram;
