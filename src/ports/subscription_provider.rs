//! SubscriptionProvider port - the external entitlement source.
//!
//! The provider answers one question per supporter: are they a backer of the
//! campaign, and have they paid this month. A provider that has never heard of
//! the e-mail is answered with `Ok(None)`, not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{ErrorCode, ErrorKind};
use crate::domain::integration::ProviderCredentials;
use crate::domain::membership::Email;

/// Charge status for one supporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeStatus {
    pub is_backer: bool,
    pub is_paid_this_month: bool,
    /// Amount paid this month, in cents.
    pub paid_value_cents: i64,
}

/// Errors from the subscription provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The integration's credentials were refused.
    #[error("provider rejected the campaign credentials")]
    Unauthorized,

    #[error("provider rate limit exhausted: {0}")]
    RateLimited(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ProviderError::Unauthorized => ErrorCode::ConfigurationError,
            ProviderError::RateLimited(_) => ErrorCode::RateLimited,
            ProviderError::Unavailable(_) | ProviderError::InvalidResponse(_) => {
                ErrorCode::ExternalServiceError
            }
        }
    }

    /// Credential failures are an operator problem, everything else is the
    /// remote side's.
    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Look up the supporter's charges for the campaign owning `credentials`.
    ///
    /// Returns `None` when the provider does not know the e-mail.
    async fn fetch_charges(
        &self,
        credentials: &ProviderCredentials,
        email: &Email,
    ) -> Result<Option<ChargeStatus>, ProviderError>;
}
