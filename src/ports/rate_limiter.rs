//! Rate limiting port for staying under the subscription provider's quota.
//!
//! The provider publishes two ceilings per campaign credential: requests per
//! second and requests per month. Each ceiling is a fixed-window counter.
//! Implementations can use in-memory storage for testing or Redis for
//! production, where several workers share one quota.

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if a request is allowed, consuming one unit of quota if so.
    ///
    /// Returns `Allowed` with remaining quota or `Denied` with retry info.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;
}

/// The window a counter covers.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitWindow {
    Second,
    /// Calendar month (UTC). The month is part of the key, so the counter
    /// starts over on the first of the month.
    Month,
}

impl RateLimitWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitWindow::Second => "second",
            RateLimitWindow::Month => "month",
        }
    }

    /// Upper bound on the window's length, used as the counter's expiry.
    pub fn duration_secs(&self) -> u32 {
        match self {
            RateLimitWindow::Second => 1,
            RateLimitWindow::Month => 31 * 24 * 60 * 60,
        }
    }
}

impl fmt::Display for RateLimitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key identifying one counter.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub window: RateLimitWindow,
    /// Credential the quota belongs to, plus the month bucket for `Month`.
    pub identifier: String,
}

impl RateLimitKey {
    pub fn per_second(credential: &str) -> Self {
        Self {
            window: RateLimitWindow::Second,
            identifier: credential.to_string(),
        }
    }

    pub fn per_month(credential: &str, now: Timestamp) -> Self {
        let at = now.as_datetime();
        Self {
            window: RateLimitWindow::Month,
            identifier: format!("{}:{:04}-{:02}", credential, at.year(), at.month()),
        }
    }

    /// Returns the Redis key string for this rate limit key.
    pub fn to_redis_key(&self) -> String {
        format!("ratelimit:provider:{}:{}", self.window, self.identifier)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Request is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Timestamp,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    pub limit: u32,
    /// Seconds until the client should retry.
    pub retry_after_secs: u32,
    pub window: RateLimitWindow,
    pub message: String,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}
