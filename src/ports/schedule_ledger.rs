//! ScheduleLedger port - at-most-once claims on cron fire times.
//!
//! Every scheduler instance computes the same fire times. Whoever claims a
//! (schedule, fire time) pair first enqueues the job; everyone else skips it.
//! Claims outlive restarts, so a redeploy neither repeats nor drops a run.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

#[async_trait]
pub trait ScheduleLedger: Send + Sync {
    /// Atomically claim `fire_at` for `schedule`, keeping the claim for
    /// `ttl_secs`. Returns `true` for the single winning caller.
    async fn claim(&self, schedule: &str, fire_at: Timestamp, ttl_secs: u64)
        -> Result<bool, DomainError>;

    /// Drops a claim whose job never reached the queue, so the next tick can
    /// claim the fire time again.
    async fn release(&self, schedule: &str, fire_at: Timestamp) -> Result<(), DomainError>;
}
