//! In-memory job queue mirroring the Redis list layout.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{Delivery, FailedJob, Job, JobQueue, QueuedJob};

#[derive(Debug, Default)]
struct Lists {
    pending: VecDeque<QueuedJob>,
    processing: Vec<QueuedJob>,
    failed: Vec<FailedJob>,
}

/// Pending, processing and failed lists behind one lock.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    lists: Mutex<Lists>,
    unavailable: AtomicBool,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending(&self) -> Vec<Job> {
        self.lists
            .lock()
            .await
            .pending
            .iter()
            .map(|q| q.job.clone())
            .collect()
    }

    pub async fn processing_len(&self) -> usize {
        self.lists.lock().await.processing.len()
    }

    /// While set, `enqueue` fails as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<QueuedJob, DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::cache("job queue unavailable"));
        }
        let queued = QueuedJob::new(job);
        self.lists.lock().await.pending.push_back(queued.clone());
        Ok(queued)
    }

    async fn dequeue(&self) -> Result<Option<Delivery>, DomainError> {
        let mut lists = self.lists.lock().await;
        let Some(job) = lists.pending.pop_front() else {
            return Ok(None);
        };
        lists.processing.push(job.clone());
        Ok(Some(Delivery {
            receipt: job.id.to_string(),
            job,
        }))
    }

    async fn complete(&self, delivery: &Delivery) -> Result<(), DomainError> {
        self.lists
            .lock()
            .await
            .processing
            .retain(|job| job.id != delivery.job.id);
        Ok(())
    }

    async fn fail(&self, delivery: &Delivery, error: &str) -> Result<(), DomainError> {
        let mut lists = self.lists.lock().await;
        lists.processing.retain(|job| job.id != delivery.job.id);
        lists.failed.push(FailedJob {
            job: delivery.job.clone(),
            error: error.to_string(),
            failed_at: Timestamp::now(),
        });
        Ok(())
    }

    async fn requeue_stale(&self) -> Result<u64, DomainError> {
        let mut lists = self.lists.lock().await;
        let stale: Vec<QueuedJob> = lists.processing.drain(..).collect();
        let count = stale.len() as u64;
        for job in stale.into_iter().rev() {
            lists.pending.push_front(job);
        }
        Ok(count)
    }

    async fn list_failed(&self, limit: u32) -> Result<Vec<FailedJob>, DomainError> {
        Ok(self
            .lists
            .lock()
            .await
            .failed
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobs_are_delivered_in_fifo_order() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(Job::SyncAll).await.unwrap();
        queue.enqueue(Job::RemovalSweep).await.unwrap();

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.job.job, Job::SyncAll);
        assert_eq!(queue.processing_len().await, 1);

        queue.complete(&first).await.unwrap();
        assert_eq!(queue.processing_len().await, 0);
        assert_eq!(queue.pending().await, vec![Job::RemovalSweep]);
    }

    #[tokio::test]
    async fn failed_jobs_are_kept_with_error() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(Job::PurgeSessions).await.unwrap();
        let delivery = queue.dequeue().await.unwrap().unwrap();

        queue.fail(&delivery, "database down").await.unwrap();

        let failed = queue.list_failed(10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error, "database down");
        assert_eq!(queue.processing_len().await, 0);
    }

    #[tokio::test]
    async fn stale_processing_jobs_go_back_to_front_of_pending() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue(Job::SyncAll).await.unwrap();
        queue.enqueue(Job::RemovalSweep).await.unwrap();
        let _abandoned = queue.dequeue().await.unwrap().unwrap();

        assert_eq!(queue.requeue_stale().await.unwrap(), 1);
        assert_eq!(queue.pending().await, vec![Job::SyncAll, Job::RemovalSweep]);
    }
}
