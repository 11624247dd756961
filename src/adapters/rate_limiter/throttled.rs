//! Rate-limited decorator around a SubscriptionProvider.
//!
//! Every call first takes a per-second slot, waiting out the window when it
//! is exhausted, then a monthly slot. The monthly quota is not waited for:
//! running out of it is reported as `ProviderError::RateLimited`.
//!
//! Counters are keyed by a digest of the campaign's provider key, so every
//! worker sharing the limiter shares the budget of each campaign.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::Timestamp;
use crate::domain::integration::ProviderCredentials;
use crate::domain::membership::Email;
use crate::ports::{
    ChargeStatus, ProviderError, RateLimitKey, RateLimitResult, RateLimiter, SubscriptionProvider,
};

pub struct ThrottledSubscriptionProvider {
    inner: Arc<dyn SubscriptionProvider>,
    limiter: Arc<dyn RateLimiter>,
    max_attempts: u32,
}

impl ThrottledSubscriptionProvider {
    pub fn new(
        inner: Arc<dyn SubscriptionProvider>,
        limiter: Arc<dyn RateLimiter>,
        max_attempts: u32,
    ) -> Self {
        Self {
            inner,
            limiter,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn take_second_slot(&self, credential: &str) -> Result<(), ProviderError> {
        for attempt in 1..=self.max_attempts {
            match self.limiter.check(RateLimitKey::per_second(credential)).await {
                Ok(RateLimitResult::Allowed(_)) => return Ok(()),
                Ok(RateLimitResult::Denied(denied)) => {
                    if attempt == self.max_attempts {
                        return Err(ProviderError::RateLimited(denied.message));
                    }
                    let wait = Duration::from_secs(u64::from(denied.retry_after_secs.max(1)));
                    tracing::debug!(
                        attempt,
                        wait_secs = wait.as_secs(),
                        "Provider per-second limit hit, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Rate limiter unavailable, calling provider unthrottled");
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn take_month_slot(&self, credential: &str) -> Result<(), ProviderError> {
        match self
            .limiter
            .check(RateLimitKey::per_month(credential, Timestamp::now()))
            .await
        {
            Ok(RateLimitResult::Allowed(status)) => {
                if status.remaining < status.limit / 10 {
                    tracing::warn!(remaining = status.remaining, "Provider monthly quota nearly spent");
                }
                Ok(())
            }
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::error!(limit = denied.limit, "Provider monthly quota exhausted");
                Err(ProviderError::RateLimited(denied.message))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Rate limiter unavailable, calling provider unthrottled");
                Ok(())
            }
        }
    }
}

/// Short digest of the provider key. Keeps the key itself out of Redis.
fn credential_id(credentials: &ProviderCredentials) -> String {
    let digest = Sha256::digest(credentials.api_key.as_bytes());
    hex::encode(&digest[..8])
}

#[async_trait]
impl SubscriptionProvider for ThrottledSubscriptionProvider {
    async fn fetch_charges(
        &self,
        credentials: &ProviderCredentials,
        email: &Email,
    ) -> Result<Option<ChargeStatus>, ProviderError> {
        let credential = credential_id(credentials);
        self.take_second_slot(&credential).await?;
        self.take_month_slot(&credential).await?;
        self.inner.fetch_charges(credentials, email).await
    }
}
