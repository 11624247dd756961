//! Telegram bot configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// `getUpdates` long polling from this process.
    #[default]
    Polling,
    /// Telegram pushes to `POST /webhooks/telegram`.
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token from BotFather. Also keys the login-widget proofs.
    pub bot_token: SecretString,

    #[serde(default)]
    pub mode: UpdateMode,

    /// Public URL registered with `setWebhook` in webhook mode.
    pub webhook_url: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` on pushed updates.
    pub webhook_secret: Option<SecretString>,

    /// Long-poll timeout passed to `getUpdates`, in seconds.
    #[serde(default = "default_polling_timeout")]
    pub polling_timeout_secs: u32,

    /// Capacity of the channel between update producers and the consumer.
    #[serde(default = "default_update_buffer")]
    pub update_buffer: usize,
}

impl TelegramConfig {
    pub fn polling_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.polling_timeout_secs))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let token = self.bot_token.expose_secret();
        if token.is_empty() {
            return Err(ValidationError::MissingRequired("TELEGRAM_BOT_TOKEN"));
        }
        match token.split_once(':') {
            Some((id, secret)) if id.parse::<u64>().is_ok() && !secret.is_empty() => {}
            _ => return Err(ValidationError::InvalidBotToken),
        }

        if self.mode == UpdateMode::Webhook {
            let has_url = self.webhook_url.as_deref().map_or(false, |u| !u.is_empty());
            let has_secret = self
                .webhook_secret
                .as_ref()
                .map_or(false, |s| !s.expose_secret().is_empty());
            if !has_url || !has_secret {
                return Err(ValidationError::WebhookModeIncomplete);
            }
        }
        if self.update_buffer == 0 {
            return Err(ValidationError::InvalidWindow("telegram.update_buffer"));
        }
        Ok(())
    }
}

fn default_polling_timeout() -> u32 {
    30
}

fn default_update_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: &str) -> TelegramConfig {
        TelegramConfig {
            bot_token: SecretString::new(token.to_string()),
            mode: UpdateMode::Polling,
            webhook_url: None,
            webhook_secret: None,
            polling_timeout_secs: default_polling_timeout(),
            update_buffer: default_update_buffer(),
        }
    }

    #[test]
    fn test_valid_polling_config() {
        assert!(config("123456:ABC-def").validate().is_ok());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            config("").validate(),
            Err(ValidationError::MissingRequired("TELEGRAM_BOT_TOKEN"))
        );
    }

    #[test]
    fn test_malformed_token() {
        assert_eq!(config("abc:def").validate(), Err(ValidationError::InvalidBotToken));
        assert_eq!(config("123456").validate(), Err(ValidationError::InvalidBotToken));
    }

    #[test]
    fn test_webhook_mode_needs_url_and_secret() {
        let mut c = config("123456:ABC");
        c.mode = UpdateMode::Webhook;
        c.webhook_url = Some("https://gate.example.com/webhooks/telegram".into());
        assert_eq!(c.validate(), Err(ValidationError::WebhookModeIncomplete));

        c.webhook_secret = Some(SecretString::new("s3cret".into()));
        assert!(c.validate().is_ok());
    }
}
