//! Subscription provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API, without trailing slash.
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// HMAC key for `x-platform-signature` on inbound webhooks.
    pub webhook_secret: SecretString,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    #[serde(default = "default_requests_per_month")]
    pub requests_per_month: u32,

    /// Attempts made when the per-second window is exhausted.
    #[serde(default = "default_throttle_attempts")]
    pub throttle_attempts: u32,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("PROVIDER_BASE_URL"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ValidationError::InvalidProviderUrl);
        }
        if production && !self.base_url.starts_with("https://") {
            return Err(ValidationError::ProviderUrlMustBeHttps);
        }
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PROVIDER_WEBHOOK_SECRET"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.requests_per_second == 0 {
            return Err(ValidationError::InvalidRateLimit("requests_per_second"));
        }
        if self.requests_per_month == 0 {
            return Err(ValidationError::InvalidRateLimit("requests_per_month"));
        }
        if self.throttle_attempts == 0 {
            return Err(ValidationError::InvalidRateLimit("throttle_attempts"));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_requests_per_month() -> u32 {
    5000
}

fn default_throttle_attempts() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            base_url: base_url.to_string(),
            timeout_secs: default_timeout(),
            webhook_secret: SecretString::new("whsec".into()),
            requests_per_second: default_requests_per_second(),
            requests_per_month: default_requests_per_month(),
            throttle_attempts: default_throttle_attempts(),
        }
    }

    #[test]
    fn test_defaults_match_provider_limits() {
        let c = config("https://api.example.com");
        assert_eq!(c.timeout(), Duration::from_secs(10));
        assert_eq!(c.requests_per_second, 5);
        assert_eq!(c.requests_per_month, 5000);
    }

    #[test]
    fn test_plain_http_only_outside_production() {
        let c = config("http://localhost:9000");
        assert!(c.validate(false).is_ok());
        assert_eq!(c.validate(true), Err(ValidationError::ProviderUrlMustBeHttps));
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert_eq!(
            config("ftp://example.com").validate(false),
            Err(ValidationError::InvalidProviderUrl)
        );
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut c = config("https://api.example.com");
        c.requests_per_second = 0;
        assert_eq!(
            c.validate(true),
            Err(ValidationError::InvalidRateLimit("requests_per_second"))
        );
    }

    #[test]
    fn test_missing_webhook_secret() {
        let mut c = config("https://api.example.com");
        c.webhook_secret = SecretString::new(String::new());
        assert!(c.validate(true).is_err());
    }
}
