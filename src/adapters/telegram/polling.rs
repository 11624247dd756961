//! Bot construction and the long-polling producer.
//!
//! Polling and webhook mode are exclusive on Telegram's side: polling clears
//! any registered webhook, webhook mode registers the URL and secret and
//! leaves `getUpdates` unused.

use std::time::Duration;

use secrecy::ExposeSecret;
use teloxide::payloads::{GetUpdatesSetters, SetWebhookSetters};
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::{ApiError, RequestError};
use tokio::sync::{mpsc, watch};

use crate::config::{TelegramConfig, UpdateMode};
use crate::domain::chat::InboundUpdate;
use crate::domain::foundation::{DomainError, ErrorCode};

use super::updates::to_inbound;

/// Pause after a failed `getUpdates` call.
const POLL_BACKOFF: Duration = Duration::from_secs(5);

fn allowed_updates() -> Vec<AllowedUpdate> {
    vec![AllowedUpdate::Message, AllowedUpdate::MyChatMember]
}

fn transport_error(action: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::ExternalServiceError,
        format!("Failed to {}: {}", action, err),
    )
}

/// Builds the bot with an HTTP timeout longer than the long-poll timeout, so
/// the client never aborts a poll Telegram is still holding open.
pub fn build_bot(config: &TelegramConfig) -> Result<Bot, DomainError> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(config.polling_timeout() + Duration::from_secs(15))
        .build()
        .map_err(|e| transport_error("build Telegram client", e))?;
    Ok(Bot::with_client(config.bot_token.expose_secret(), client))
}

/// Registers or clears the webhook to match the configured update mode.
pub async fn prepare_webhook(bot: &Bot, config: &TelegramConfig) -> Result<(), DomainError> {
    match config.mode {
        UpdateMode::Polling => {
            bot.delete_webhook()
                .await
                .map_err(|e| transport_error("clear Telegram webhook", e))?;
            tracing::info!("Telegram webhook cleared, using long polling");
        }
        UpdateMode::Webhook => {
            let (Some(url), Some(secret)) = (&config.webhook_url, &config.webhook_secret) else {
                return Err(DomainError::new(
                    ErrorCode::ConfigurationError,
                    "webhook mode needs both a URL and a secret",
                ));
            };
            let url = url
                .parse()
                .map_err(|e| transport_error("parse Telegram webhook URL", e))?;
            bot.set_webhook(url)
                .secret_token(secret.expose_secret().clone())
                .allowed_updates(allowed_updates())
                .await
                .map_err(|e| transport_error("register Telegram webhook", e))?;
            tracing::info!("Telegram webhook registered");
        }
    }
    Ok(())
}

/// Polls `getUpdates` until shutdown, sending every convertible update into
/// `updates`. Stops early if the consumer is gone or another instance starts
/// polling with the same token.
pub async fn run_polling(
    bot: Bot,
    timeout_secs: u32,
    updates: mpsc::Sender<InboundUpdate>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(timeout_secs, "Telegram polling started");
    let mut offset: i32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout_secs)
            .allowed_updates(allowed_updates());

        let result = tokio::select! {
            result = request.send() => result,
            _ = shutdown.changed() => break,
        };

        match result {
            Ok(batch) => {
                tracing::debug!(count = batch.len(), "Telegram updates received");
                for update in batch {
                    offset = update.id.as_offset();
                    let Some(inbound) = to_inbound(update) else {
                        continue;
                    };
                    if updates.send(inbound).await.is_err() {
                        tracing::warn!("Update consumer gone, stopping polling");
                        return;
                    }
                }
            }
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                tracing::error!("Another instance is polling with this bot token, stopping");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Telegram getUpdates failed");
                tokio::select! {
                    _ = tokio::time::sleep(POLL_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    tracing::info!("Telegram polling stopped");
}
