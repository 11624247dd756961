//! Redis implementation of JobQueue.
//!
//! Three lists under the configured namespace:
//!
//! - `{ns}:jobs:pending` - `LPUSH` on enqueue, consumed from the right
//! - `{ns}:jobs:processing` - `RPOPLPUSH` target; the raw payload is the receipt
//! - `{ns}:jobs:failed` - newest first, capped at [`FAILED_RETENTION`]
//!
//! A job is only ever in one list, so a crash between dequeue and ack leaves
//! it in processing for `requeue_stale`.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{Delivery, FailedJob, Job, JobQueue, QueuedJob};

use super::cache_error;

/// Failed jobs kept for inspection.
pub const FAILED_RETENTION: isize = 1000;

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: MultiplexedConnection,
    pending: String,
    processing: String,
    failed: String,
}

impl RedisJobQueue {
    pub fn new(conn: MultiplexedConnection, namespace: &str) -> Self {
        Self {
            conn,
            pending: format!("{}:jobs:pending", namespace),
            processing: format!("{}:jobs:processing", namespace),
            failed: format!("{}:jobs:failed", namespace),
        }
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value)
        .map_err(|e| DomainError::new(ErrorCode::InternalError, format!("Failed to encode job: {}", e)))
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: Job) -> Result<QueuedJob, DomainError> {
        let queued = QueuedJob::new(job);
        let payload = encode(&queued)?;

        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(&self.pending)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(cache_error("enqueue job"))?;

        tracing::debug!(job_id = %queued.id, job = queued.job.name(), "Job enqueued");
        Ok(queued)
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, DomainError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(&self.pending)
            .arg(&self.processing)
            .query_async(&mut conn)
            .await
            .map_err(cache_error("dequeue job"))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<QueuedJob>(&raw) {
            Ok(job) => Ok(Some(Delivery { job, receipt: raw })),
            Err(e) => {
                // Park the payload in the failed list untouched.
                tracing::error!(error = %e, "Undecodable job payload moved to failed list");
                redis::pipe()
                    .atomic()
                    .cmd("LREM")
                    .arg(&self.processing)
                    .arg(1)
                    .arg(&raw)
                    .ignore()
                    .cmd("LPUSH")
                    .arg(&self.failed)
                    .arg(&raw)
                    .ignore()
                    .query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(cache_error("park undecodable job"))?;
                Ok(None)
            }
        }
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(&delivery.receipt)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(cache_error("acknowledge job"))?;
        Ok(())
    }

    async fn fail(&self, delivery: &Delivery, error: &str) -> Result<(), DomainError> {
        let entry = encode(&FailedJob {
            job: delivery.job.clone(),
            error: error.to_string(),
            failed_at: Timestamp::now(),
        })?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.processing)
            .arg(1)
            .arg(&delivery.receipt)
            .ignore()
            .cmd("LPUSH")
            .arg(&self.failed)
            .arg(entry)
            .ignore()
            .cmd("LTRIM")
            .arg(&self.failed)
            .arg(0)
            .arg(FAILED_RETENTION - 1)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_error("record failed job"))
    }

    async fn requeue_stale(&self) -> Result<u64, DomainError> {
        let mut conn = self.conn.clone();
        let mut moved = 0;
        loop {
            let raw: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&self.processing)
                .arg(&self.pending)
                .query_async(&mut conn)
                .await
                .map_err(cache_error("requeue stale job"))?;
            if raw.is_none() {
                return Ok(moved);
            }
            moved += 1;
        }
    }

    async fn list_failed(&self, limit: u32) -> Result<Vec<FailedJob>, DomainError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.failed)
            .arg(0)
            .arg(i64::from(limit) - 1)
            .query_async(&mut conn)
            .await
            .map_err(cache_error("list failed jobs"))?;

        Ok(raw
            .iter()
            .filter_map(|entry| match serde_json::from_str::<FailedJob>(entry) {
                Ok(failed) => Some(failed),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable failed-job entry");
                    None
                }
            })
            .collect())
    }
}

impl std::fmt::Debug for RedisJobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisJobQueue")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
