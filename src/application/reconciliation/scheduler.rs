//! Cron triggers feeding the job queue.
//!
//! Each tick walks every fire time between the previous tick and now, claims
//! it in the schedule ledger and enqueues the job only on a won claim. All
//! instances compute identical fire times, so at most one of them enqueues
//! each run. On start the cursor is placed `catch_up` in the past so a run
//! that fell inside a short redeploy window is still picked up.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cron::Schedule;
use tokio::sync::{watch, Mutex};
use tokio::time;

use crate::domain::foundation::Timestamp;
use crate::ports::{Job, JobQueue, ScheduleLedger};

use super::ReconciliationError;

/// One recurring job.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    name: String,
    expression: String,
    schedule: Schedule,
    job: Job,
}

impl CronTrigger {
    /// Parses a five-field cron expression (`min hour dom mon dow`).
    pub fn new(
        name: impl Into<String>,
        expression: &str,
        job: Job,
    ) -> Result<Self, ReconciliationError> {
        let schedule = Schedule::from_str(&format!("0 {} *", expression.trim())).map_err(|e| {
            ReconciliationError::InvalidSchedule {
                expression: expression.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            name: name.into(),
            expression: expression.to_string(),
            schedule,
            job,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Fire times in `(after, until]`, oldest first.
    pub fn fire_times(&self, after: Timestamp, until: Timestamp) -> Vec<Timestamp> {
        self.schedule
            .after(after.as_datetime())
            .take_while(|at| at <= until.as_datetime())
            .map(Timestamp::from_datetime)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often fire times are evaluated.
    pub tick_interval: Duration,
    /// How far back the first tick looks for missed fire times.
    pub catch_up: Duration,
    /// Lifetime of a fire-time claim. Must exceed `catch_up`.
    pub claim_ttl: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            catch_up: Duration::from_secs(15 * 60),
            claim_ttl: Duration::from_secs(48 * 3600),
        }
    }
}

pub struct ReconciliationScheduler {
    ledger: Arc<dyn ScheduleLedger>,
    queue: Arc<dyn JobQueue>,
    triggers: Vec<CronTrigger>,
    config: SchedulerConfig,
    cursor: Mutex<Option<Timestamp>>,
}

impl ReconciliationScheduler {
    pub fn new(
        ledger: Arc<dyn ScheduleLedger>,
        queue: Arc<dyn JobQueue>,
        triggers: Vec<CronTrigger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ledger,
            queue,
            triggers,
            config,
            cursor: Mutex::new(None),
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), ReconciliationError> {
        let mut interval = time::interval(self.config.tick_interval);
        tracing::info!(
            triggers = ?self.triggers.iter().map(|t| (t.name(), t.expression())).collect::<Vec<_>>(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Scheduler stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    if let Err(err) = self.tick_at(Timestamp::now()).await {
                        tracing::error!(error = %err, "Scheduler tick failed");
                    }
                }
            }
        }
    }

    /// Enqueues every claimed fire time up to `now`. Returns how many jobs
    /// were enqueued.
    pub async fn tick_at(&self, now: Timestamp) -> Result<usize, ReconciliationError> {
        let mut cursor = self.cursor.lock().await;
        let after = cursor.unwrap_or_else(|| now.minus_secs(self.config.catch_up.as_secs() as i64));

        let mut enqueued = 0;
        for trigger in &self.triggers {
            for fire_at in trigger.fire_times(after, now) {
                let won = self
                    .ledger
                    .claim(trigger.name(), fire_at, self.config.claim_ttl.as_secs())
                    .await?;
                if !won {
                    tracing::debug!(schedule = trigger.name(), fire_at = %fire_at.as_datetime(), "Fire time already claimed");
                    continue;
                }
                let queued = match self.queue.enqueue(trigger.job.clone()).await {
                    Ok(queued) => queued,
                    Err(err) => {
                        // The cursor stays put; the next tick retries this fire time.
                        if let Err(release_err) = self.ledger.release(trigger.name(), fire_at).await {
                            tracing::error!(
                                schedule = trigger.name(),
                                fire_at = %fire_at.as_datetime(),
                                error = %release_err,
                                "Could not release claim of unqueued run"
                            );
                        }
                        return Err(err.into());
                    }
                };
                enqueued += 1;
                tracing::info!(
                    schedule = trigger.name(),
                    fire_at = %fire_at.as_datetime(),
                    job_id = %queued.id,
                    "Scheduled job enqueued"
                );
            }
        }

        *cursor = Some(now);
        Ok(enqueued)
    }
}
