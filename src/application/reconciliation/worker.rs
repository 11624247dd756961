//! Queue worker.
//!
//! Polls the durable queue and runs each job to completion. Success drops
//! the job; failure moves it to the failed list with the error. Several
//! workers may run side by side.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::DomainError;
use crate::ports::{Delivery, JobQueue};

use super::{JobOutcome, ReconciliationJobs};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often an idle worker checks the queue.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl WorkerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

pub struct ReconciliationWorker {
    queue: Arc<dyn JobQueue>,
    jobs: Arc<ReconciliationJobs>,
    config: WorkerConfig,
    name: String,
}

impl ReconciliationWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        jobs: Arc<ReconciliationJobs>,
        config: WorkerConfig,
        name: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            jobs,
            config,
            name: name.into(),
        }
    }

    /// Hands jobs left in processing by a crashed worker back to the
    /// pending list. Call once at startup, before any worker runs.
    pub async fn recover_stale(&self) -> Result<u64, DomainError> {
        let requeued = self.queue.requeue_stale().await?;
        if requeued > 0 {
            tracing::warn!(requeued, "Requeued jobs left in processing");
        }
        Ok(requeued)
    }

    /// Run until shutdown. The job in progress is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut interval = time::interval(self.config.poll_interval);
        tracing::info!(worker = %self.name, "Worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!(worker = %self.name, "Worker stopped");
                        return Ok(());
                    }
                }

                _ = interval.tick() => {
                    loop {
                        if *shutdown.borrow() {
                            break;
                        }
                        match self.process_next().await {
                            Ok(Some(_)) => continue,
                            Ok(None) => break,
                            Err(err) => {
                                tracing::error!(worker = %self.name, error = %err, "Queue unavailable");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Dequeues and runs one job. `None` when the queue is empty.
    ///
    /// A failing job is recorded on the queue and reported as processed;
    /// only queue errors are returned.
    pub async fn process_next(&self) -> Result<Option<Result<JobOutcome, String>>, DomainError> {
        let Some(delivery) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        Ok(Some(self.process(&delivery).await?))
    }

    async fn process(&self, delivery: &Delivery) -> Result<Result<JobOutcome, String>, DomainError> {
        let job = &delivery.job;
        tracing::debug!(worker = %self.name, job_id = %job.id, job = job.job.name(), "Job started");

        match self.jobs.execute(&job.job).await {
            Ok(outcome) => {
                self.queue.complete(delivery).await?;
                tracing::info!(
                    worker = %self.name,
                    job_id = %job.id,
                    job = job.job.name(),
                    outcome = ?outcome,
                    "Job completed"
                );
                Ok(Ok(outcome))
            }
            Err(err) => {
                let message = err.to_string();
                self.queue.fail(delivery, &message).await?;
                tracing::error!(
                    worker = %self.name,
                    job_id = %job.id,
                    job = job.job.name(),
                    error = %message,
                    "Job failed"
                );
                Ok(Err(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Harness;
    use crate::ports::{Job, ProviderError};

    fn worker(h: &Harness) -> ReconciliationWorker {
        ReconciliationWorker::new(h.queue.clone(), h.jobs.clone(), WorkerConfig::default(), "test")
    }

    #[tokio::test]
    async fn empty_queue_yields_none() {
        let h = Harness::new().await;
        assert!(worker(&h).process_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_job_is_dropped() {
        let h = Harness::new().await;
        h.queue.enqueue(Job::RemovalSweep).await.unwrap();

        let processed = worker(&h).process_next().await.unwrap().unwrap();

        assert!(processed.is_ok());
        assert_eq!(h.queue.processing_len().await, 0);
        assert!(h.queue.list_failed(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_job_is_kept_with_error() {
        let h = Harness::new().await;
        h.seed_active("a@b.io", 1).await;
        h.provider.set_failure("a@b.io", ProviderError::Unauthorized).await;
        h.jobs.enqueue_sync(h.integration.id()).await.unwrap();

        let processed = worker(&h).process_next().await.unwrap().unwrap();

        assert!(processed.is_err());
        let failed = h.queue.list_failed(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].error.contains("configuration"));
    }

    #[tokio::test]
    async fn fan_out_jobs_are_picked_up_by_the_next_poll() {
        let h = Harness::new().await;
        h.queue.enqueue(Job::SyncAll).await.unwrap();
        let worker = worker(&h);

        worker.process_next().await.unwrap();
        let synced = worker.process_next().await.unwrap().unwrap().unwrap();

        assert!(matches!(synced, JobOutcome::Synced(_)));
    }

    #[tokio::test]
    async fn stale_jobs_are_recovered() {
        let h = Harness::new().await;
        h.queue.enqueue(Job::PurgeSessions).await.unwrap();
        h.queue.dequeue().await.unwrap();

        let requeued = worker(&h).recover_stale().await.unwrap();

        assert_eq!(requeued, 1);
        assert_eq!(h.queue.pending().await, vec![Job::PurgeSessions]);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = Harness::new().await;
        let worker = worker(&h);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { worker.run(rx).await });
        tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
    }
}
