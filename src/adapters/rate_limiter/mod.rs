//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port for different backends.
//!
//! ## Available Adapters
//!
//! - `RedisRateLimiter` - Redis-backed, shared by every worker
//!
//! `ThrottledSubscriptionProvider` puts a limiter in front of the provider.

mod config;
mod redis;
mod throttled;

pub use config::ProviderRateLimits;
pub use redis::RedisRateLimiter;
pub use throttled::ThrottledSubscriptionProvider;
