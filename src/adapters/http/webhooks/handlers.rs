use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use secrecy::ExposeSecret;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::state::AppState;
use crate::adapters::telegram::to_inbound;
use crate::domain::foundation::ErrorCode;
use crate::domain::webhook::SIGNATURE_HEADER;

use super::TELEGRAM_SECRET_HEADER;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /webhooks/platform
///
/// The raw body is handed over untouched: the signature covers the exact
/// bytes sent.
pub async fn platform_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = header(&headers, SIGNATURE_HEADER);
    let outcome = state.webhooks.handle(&body, signature).await?;
    tracing::info!(?outcome, "Platform webhook processed");
    Ok(Json(json!({ "received": true })))
}

/// POST /webhooks/telegram
///
/// Always answers 200 once the secret matches, even for updates that are
/// dropped, so Telegram does not redeliver them.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // Polling mode: the route does not exist.
    let Some(expected) = state.telegram_secret.as_ref() else {
        return Ok(StatusCode::NOT_FOUND);
    };
    let provided = header(&headers, TELEGRAM_SECRET_HEADER).unwrap_or_default();
    let matches: bool = provided
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .into();
    if !matches {
        tracing::warn!("Telegram webhook called with a bad secret");
        return Err(ApiError::unauthorized("Invalid webhook secret"));
    }

    let update: teloxide::types::Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable Telegram update dropped");
            return Ok(StatusCode::OK);
        }
    };

    if let Some(inbound) = to_inbound(update) {
        if state.updates.send(inbound).await.is_err() {
            return Err(ApiError::new(
                ErrorCode::InternalError,
                "update consumer is not running",
            ));
        }
    }
    Ok(StatusCode::OK)
}
