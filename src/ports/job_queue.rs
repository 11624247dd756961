//! Durable job queue port for reconciliation work.
//!
//! A dequeued job stays in a processing area until it is acknowledged. A
//! worker that dies mid-job leaves the job there, and `requeue_stale` hands it
//! back to the pending list on the next start. Completed jobs are dropped,
//! failed jobs are kept with their error for inspection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, IntegrationId, Timestamp};

/// Units of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Fan out one `SyncIntegration` per active integration.
    SyncAll,
    /// Re-verify every reconciled member of one integration.
    SyncIntegration { integration_id: IntegrationId },
    /// Warn overdue members, then remove those past the tolerance window.
    RemovalSweep,
    /// Delete sessions expired longer than the retention window.
    PurgeSessions,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SyncAll => "sync_all",
            Job::SyncIntegration { .. } => "sync_integration",
            Job::RemovalSweep => "removal_sweep",
            Job::PurgeSessions => "purge_sessions",
        }
    }
}

/// A job as stored on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: Job,
    pub enqueued_at: Timestamp,
}

impl QueuedJob {
    pub fn new(job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            job,
            enqueued_at: Timestamp::now(),
        }
    }
}

/// A job handed to a worker, plus the opaque receipt the backend needs to
/// acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub job: QueuedJob,
    pub receipt: String,
}

/// A job kept after failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub job: QueuedJob,
    pub error: String,
    pub failed_at: Timestamp,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to the pending list.
    async fn enqueue(&self, job: Job) -> Result<QueuedJob, DomainError>;

    /// Move the oldest pending job into processing. `None` if the queue is empty.
    async fn dequeue(&self) -> Result<Option<Delivery>, DomainError>;

    /// Drop a successfully processed job.
    async fn complete(&self, delivery: &Delivery) -> Result<(), DomainError>;

    /// Move a job from processing to the failed list along with `error`.
    async fn fail(&self, delivery: &Delivery, error: &str) -> Result<(), DomainError>;

    /// Move everything left in processing back to pending. Returns the count.
    async fn requeue_stale(&self) -> Result<u64, DomainError>;

    /// Most recent failures, newest first.
    async fn list_failed(&self, limit: u32) -> Result<Vec<FailedJob>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_queue_is_object_safe() {
        fn _accepts_dyn(_queue: &dyn JobQueue) {}
    }

    #[test]
    fn jobs_serialize_with_type_tag() {
        let id = IntegrationId::new();
        let value = serde_json::to_value(Job::SyncIntegration { integration_id: id }).unwrap();
        assert_eq!(
            value,
            json!({"type": "sync_integration", "integration_id": id.to_string()})
        );
        assert_eq!(
            serde_json::to_value(Job::RemovalSweep).unwrap(),
            json!({"type": "removal_sweep"})
        );
    }

    #[test]
    fn queued_job_roundtrips() {
        let queued = QueuedJob::new(Job::PurgeSessions);
        let text = serde_json::to_string(&queued).unwrap();
        let back: QueuedJob = serde_json::from_str(&text).unwrap();
        assert_eq!(back, queued);
    }
}
