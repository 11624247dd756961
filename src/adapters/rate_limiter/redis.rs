//! Redis-backed rate limiter implementation for production deployments.
//!
//! Uses a simple fixed-window counter algorithm with Redis INCR + EXPIRE.
//! All workers share one counter per provider credential.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::ProviderRateLimits;

/// Redis-backed rate limiter for multi-worker deployments.
///
/// Uses a fixed-window counter algorithm:
/// 1. INCR the key to increment the counter
/// 2. If count is 1, set EXPIRE for the window duration
/// 3. If count > limit, deny the request
///
/// Requests can briefly exceed the limit at window boundaries. The provider
/// tolerates that for the per-second ceiling, and the monthly key is bucketed
/// by calendar month so it never straddles two months.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    limits: ProviderRateLimits,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, limits: ProviderRateLimits) -> Self {
        Self { conn, limits }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let limit = self.limits.limit_for(key.window);
        let window_secs = key.window.duration_secs();

        let mut conn = self.conn.clone();

        // Atomic increment
        let count: i64 = conn
            .incr(&redis_key, 1_i64)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        // Set expiry on first request in window
        if count == 1 {
            conn.expire::<_, ()>(&redis_key, window_secs as i64)
                .await
                .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;
        }

        // Get TTL for reset time
        let ttl: i64 = conn
            .ttl(&redis_key)
            .await
            .map_err(|e: redis::RedisError| RateLimitError::Unavailable(e.to_string()))?;

        let now = Timestamp::now();
        let reset_secs = if ttl > 0 { ttl } else { window_secs as i64 };
        let reset_at = now.plus_secs(reset_secs);

        if count > limit as i64 {
            let retry_after = reset_secs.max(1) as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: retry_after,
                window: key.window,
                message: format!(
                    "Rate limit exceeded for {} window. Retry after {} seconds.",
                    key.window, retry_after
                ),
            }));
        }

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(count as u32),
            reset_at,
        }))
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
