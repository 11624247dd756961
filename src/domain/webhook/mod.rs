//! Webhook module - authenticated platform events.

mod event;
mod signature;

pub use event::{PlatformEvent, SupporterPayload};
pub use signature::{WebhookSignatureVerifier, SIGNATURE_HEADER};

use thiserror::Error;

/// Errors from webhook verification and parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("Missing webhook signature")]
    MissingSignature,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Failed to parse webhook payload: {0}")]
    ParseError(String),
}
