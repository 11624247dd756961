//! In-memory cron claim ledger.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::ScheduleLedger;

/// Claims never expire here; tests run far shorter than any TTL.
#[derive(Debug, Default)]
pub struct InMemoryScheduleLedger {
    claims: Mutex<HashSet<(String, i64)>>,
}

impl InMemoryScheduleLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleLedger for InMemoryScheduleLedger {
    async fn claim(
        &self,
        schedule: &str,
        fire_at: Timestamp,
        _ttl_secs: u64,
    ) -> Result<bool, DomainError> {
        Ok(self
            .claims
            .lock()
            .await
            .insert((schedule.to_string(), fire_at.as_unix_secs())))
    }

    async fn release(&self, schedule: &str, fire_at: Timestamp) -> Result<(), DomainError> {
        self.claims
            .lock()
            .await
            .remove(&(schedule.to_string(), fire_at.as_unix_secs()));
        Ok(())
    }
}
