//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Bot token is not in '<id>:<secret>' form")]
    InvalidBotToken,

    #[error("Webhook mode needs telegram.webhook_url and telegram.webhook_secret")]
    WebhookModeIncomplete,

    #[error("Provider base URL must be http(s)")]
    InvalidProviderUrl,

    #[error("Provider base URL must use HTTPS in production")]
    ProviderUrlMustBeHttps,

    #[error("Rate limit '{0}' must be positive")]
    InvalidRateLimit(&'static str),

    #[error("Window '{0}' must be positive")]
    InvalidWindow(&'static str),

    #[error("Invalid cron expression for {name}: {message}")]
    InvalidCron { name: &'static str, message: String },

    #[error("Worker count must be between 1 and 32")]
    InvalidWorkerCount,
}
