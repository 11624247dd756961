//! Scripted subscription provider for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::integration::ProviderCredentials;
use crate::domain::membership::Email;
use crate::ports::{ChargeStatus, ProviderError, SubscriptionProvider};

/// Answers from a table keyed by e-mail. Unknown e-mails are "not found".
#[derive(Debug, Default)]
pub struct InMemorySubscriptionProvider {
    charges: RwLock<HashMap<String, Result<ChargeStatus, ProviderError>>>,
    key_failures: RwLock<HashMap<String, ProviderError>>,
    calls: AtomicUsize,
}

impl InMemorySubscriptionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backer who paid `paid_value_cents` this month.
    pub async fn set_paid(&self, email: &str, paid_value_cents: i64) {
        self.set(
            email,
            Ok(ChargeStatus {
                is_backer: true,
                is_paid_this_month: true,
                paid_value_cents,
            }),
        )
        .await;
    }

    /// A backer whose monthly charge has not gone through.
    pub async fn set_unpaid(&self, email: &str) {
        self.set(
            email,
            Ok(ChargeStatus {
                is_backer: true,
                is_paid_this_month: false,
                paid_value_cents: 0,
            }),
        )
        .await;
    }

    pub async fn set_failure(&self, email: &str, error: ProviderError) {
        self.set(email, Err(error)).await;
    }

    /// Every call made with `api_key` fails, whatever the e-mail.
    pub async fn set_key_failure(&self, api_key: &str, error: ProviderError) {
        self.key_failures
            .write()
            .await
            .insert(api_key.to_string(), error);
    }

    pub async fn forget(&self, email: &str) {
        self.charges.write().await.remove(&email.to_lowercase());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn set(&self, email: &str, answer: Result<ChargeStatus, ProviderError>) {
        self.charges
            .write()
            .await
            .insert(email.to_lowercase(), answer);
    }
}

#[async_trait]
impl SubscriptionProvider for InMemorySubscriptionProvider {
    async fn fetch_charges(
        &self,
        credentials: &ProviderCredentials,
        email: &Email,
    ) -> Result<Option<ChargeStatus>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.key_failures.read().await.get(&credentials.api_key) {
            return Err(error.clone());
        }
        match self.charges.read().await.get(email.as_str()) {
            Some(answer) => answer.clone().map(Some),
            None => Ok(None),
        }
    }
}
