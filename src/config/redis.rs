//! Redis configuration
//!
//! Redis carries the credential exchange store, the job queue, cron claims
//! and the provider rate-limit counters.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix for queue and claim keys, so several deployments can share
    /// one Redis
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_NAMESPACE"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            namespace: default_namespace(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_namespace() -> String {
    "supporter_gate".to_string()
}

fn default_timeout() -> u64 {
    5
}
