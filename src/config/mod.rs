//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `SUPPORTER_GATE` prefix
//! and `__` between nesting levels.
//!
//! # Example
//!
//! ```no_run
//! use supporter_gate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod membership;
mod provider;
mod redis;
mod scheduler;
mod server;
mod telegram;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use membership::MembershipConfig;
pub use provider::ProviderConfig;
pub use redis::RedisConfig;
pub use scheduler::SchedulerConfig;
pub use server::{Environment, LogFormat, ServerConfig};
pub use telegram::{TelegramConfig, UpdateMode};

use serde::Deserialize;

/// Root application configuration
///
/// Load with [`AppConfig::load()`], then call [`AppConfig::validate()`].
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub redis: RedisConfig,

    pub telegram: TelegramConfig,

    /// Subscription provider API and its webhooks
    pub provider: ProviderConfig,

    #[serde(default)]
    pub membership: MembershipConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `SUPPORTER_GATE` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `SUPPORTER_GATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUPPORTER_GATE__TELEGRAM__BOT_TOKEN=...` -> `telegram.bot_token = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or a value
    /// does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUPPORTER_GATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found, section by section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.telegram.validate()?;
        self.provider.validate(self.is_production())?;
        self.membership.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; tests touching them run one at a time.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("SUPPORTER_GATE__DATABASE__URL", "postgresql://gate@localhost/gate"),
        ("SUPPORTER_GATE__REDIS__URL", "redis://localhost:6379"),
        ("SUPPORTER_GATE__TELEGRAM__BOT_TOKEN", "123456:ABC-def"),
        ("SUPPORTER_GATE__PROVIDER__BASE_URL", "https://api.example.com"),
        ("SUPPORTER_GATE__PROVIDER__WEBHOOK_SECRET", "whsec"),
    ];

    const OPTIONAL: &[&str] = &[
        "SUPPORTER_GATE__SERVER__PORT",
        "SUPPORTER_GATE__SERVER__ENVIRONMENT",
        "SUPPORTER_GATE__MEMBERSHIP__INVITE_TTL_HOURS",
        "SUPPORTER_GATE__TELEGRAM__MODE",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let config = load_with(&[]).expect("config loads");

        assert_eq!(config.database.url, "postgresql://gate@localhost/gate");
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.telegram.bot_token.expose_secret(), "123456:ABC-def");
        assert_eq!(config.telegram.mode, UpdateMode::Polling);
    }

    #[test]
    fn test_minimal_config_validates() {
        let config = load_with(&[]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_optional_sections_take_defaults() {
        let config = load_with(&[]).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.membership.invite_ttl_hours, 24);
        assert_eq!(config.scheduler.sync_cron, "0 2 * * *");
        assert_eq!(config.provider.requests_per_second, 5);
    }

    #[test]
    fn test_nested_override() {
        let config = load_with(&[
            ("SUPPORTER_GATE__SERVER__PORT", "3000"),
            ("SUPPORTER_GATE__MEMBERSHIP__INVITE_TTL_HOURS", "12"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.membership.invite_ttl_hours, 12);
    }

    #[test]
    fn test_production_requires_https_provider() {
        let config = load_with(&[
            ("SUPPORTER_GATE__SERVER__ENVIRONMENT", "production"),
            ("SUPPORTER_GATE__PROVIDER__BASE_URL", "http://api.example.com"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::ProviderUrlMustBeHttps));
    }

    #[test]
    fn test_webhook_mode_without_secret_fails_validation() {
        let config = load_with(&[("SUPPORTER_GATE__TELEGRAM__MODE", "webhook")]).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::WebhookModeIncomplete));
    }
}
