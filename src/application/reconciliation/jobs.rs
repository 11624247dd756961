//! Job bodies run by the reconciliation worker.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::application::{
    journal_best_effort, AccessError, AccessVerifier, AuthorizationSessionManager,
    MembershipLedger,
};
use crate::domain::access::{AccessDecision, DenialReason};
use crate::domain::foundation::IntegrationId;
use crate::domain::integration::Integration;
use crate::domain::journal::JournalEntry;
use crate::domain::membership::{MembershipError, MembershipRecord, RemovalReason, Transition};
use crate::ports::{EventJournal, IntegrationRepository, Job, JobQueue, MessagingGateway, QueuedJob};

use super::ReconciliationError;

/// Windows governing warnings and removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationSettings {
    /// Days an overdue member keeps access after the last failed check.
    pub removal_tolerance_days: i64,
    /// Window quoted in the grace notice.
    pub warning_grace_hours: i64,
    /// Sessions are purged this long after they expire.
    pub session_retention_hours: i64,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            removal_tolerance_days: 7,
            warning_grace_hours: 48,
            session_retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub checked: usize,
    pub overdue: usize,
    pub recovered: usize,
    pub removed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub warned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// What a finished job did, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    FannedOut { enqueued: usize },
    Synced(SyncSummary),
    /// The integration was deleted or deactivated after the job was queued.
    Skipped { integration_id: IntegrationId },
    Swept(SweepSummary),
    Purged { sessions: u64 },
}

pub struct ReconciliationJobs {
    verifier: Arc<AccessVerifier>,
    ledger: Arc<MembershipLedger>,
    handshake: Arc<AuthorizationSessionManager>,
    integrations: Arc<dyn IntegrationRepository>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
    queue: Arc<dyn JobQueue>,
    settings: ReconciliationSettings,
}

impl ReconciliationJobs {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        verifier: Arc<AccessVerifier>,
        ledger: Arc<MembershipLedger>,
        handshake: Arc<AuthorizationSessionManager>,
        integrations: Arc<dyn IntegrationRepository>,
        gateway: Arc<dyn MessagingGateway>,
        journal: Arc<dyn EventJournal>,
        queue: Arc<dyn JobQueue>,
        settings: ReconciliationSettings,
    ) -> Self {
        Self {
            verifier,
            ledger,
            handshake,
            integrations,
            gateway,
            journal,
            queue,
            settings,
        }
    }

    pub async fn execute(&self, job: &Job) -> Result<JobOutcome, ReconciliationError> {
        match job {
            Job::SyncAll => self.sync_all().await,
            Job::SyncIntegration { integration_id } => self.sync_integration(*integration_id).await,
            Job::RemovalSweep => self.removal_sweep().await.map(JobOutcome::Swept),
            Job::PurgeSessions => {
                let sessions = self
                    .handshake
                    .purge_expired(self.settings.session_retention_hours)
                    .await?;
                Ok(JobOutcome::Purged { sessions })
            }
        }
    }

    /// Queues a sync of one integration outside the schedule.
    pub async fn enqueue_sync(
        &self,
        integration_id: IntegrationId,
    ) -> Result<QueuedJob, ReconciliationError> {
        self.integrations
            .find_by_id(integration_id)
            .await?
            .ok_or(ReconciliationError::IntegrationNotFound(integration_id))?;
        let queued = self
            .queue
            .enqueue(Job::SyncIntegration { integration_id })
            .await?;
        tracing::info!(integration_id = %integration_id, job_id = %queued.id, "Sync queued");
        Ok(queued)
    }

    /// One `SyncIntegration` job per active integration, so each can fail
    /// and be retried on its own.
    async fn sync_all(&self) -> Result<JobOutcome, ReconciliationError> {
        let integrations = self.integrations.list_active().await?;
        for integration in &integrations {
            self.queue
                .enqueue(Job::SyncIntegration {
                    integration_id: integration.id(),
                })
                .await?;
        }
        Ok(JobOutcome::FannedOut {
            enqueued: integrations.len(),
        })
    }

    /// Re-verifies every active and overdue member of one integration.
    pub async fn sync_integration(
        &self,
        integration_id: IntegrationId,
    ) -> Result<JobOutcome, ReconciliationError> {
        let integration = match self.integrations.find_by_id(integration_id).await? {
            Some(integration) if integration.is_active() => integration,
            _ => {
                tracing::info!(integration_id = %integration_id, "Sync skipped, integration gone or inactive");
                return Ok(JobOutcome::Skipped { integration_id });
            }
        };

        let records = self.ledger.needing_reconciliation(integration_id).await?;
        let mut summary = SyncSummary::default();

        for record in records {
            summary.checked += 1;
            match self.reconcile(&integration, &record).await {
                Ok(Settled::Overdue) => summary.overdue += 1,
                Ok(Settled::Recovered) => summary.recovered += 1,
                Ok(Settled::Removed) => summary.removed += 1,
                Ok(Settled::Unchanged) => {}
                Err(RecordFailure::Fatal(err)) => {
                    tracing::error!(
                        integration_id = %integration_id,
                        error = %err,
                        "Sync aborted"
                    );
                    self.journal_failure(&record, &err.to_string()).await;
                    return Err(err);
                }
                Err(RecordFailure::Skipped(message)) => {
                    summary.failed += 1;
                    tracing::warn!(
                        membership_id = %record.id(),
                        error = %message,
                        "Member check failed"
                    );
                    self.journal_failure(&record, &message).await;
                }
            }
        }

        tracing::info!(
            integration_id = %integration_id,
            checked = summary.checked,
            overdue = summary.overdue,
            recovered = summary.recovered,
            removed = summary.removed,
            failed = summary.failed,
            "Integration synced"
        );
        Ok(JobOutcome::Synced(summary))
    }

    async fn reconcile(
        &self,
        integration: &Integration,
        record: &MembershipRecord,
    ) -> Result<Settled, RecordFailure> {
        let decision = self
            .verifier
            .check_integration(integration, record.email())
            .await
            .map_err(RecordFailure::from)?;

        let id = record.id();
        let settled = match decision {
            AccessDecision::Granted(_) => applied(
                self.ledger.mark_recovered(id).await,
                Settled::Recovered,
            )?,
            AccessDecision::Denied(DenialReason::NotSubscriber) => applied(
                self.ledger.remove(id, RemovalReason::SubscriberNotFound).await,
                Settled::Removed,
            )?,
            AccessDecision::Denied(_) => {
                applied(self.ledger.mark_overdue(id).await, Settled::Overdue)?
            }
        };
        Ok(settled)
    }

    /// Warns overdue members once, then removes those past the tolerance
    /// window.
    pub async fn removal_sweep(&self) -> Result<SweepSummary, ReconciliationError> {
        let mut summary = SweepSummary::default();
        let mut titles: HashMap<IntegrationId, String> = HashMap::new();

        for record in self.ledger.needing_warning().await? {
            match self.warn(&record, &mut titles).await {
                Ok(true) => summary.warned += 1,
                Ok(false) => {}
                Err(message) => {
                    summary.failed += 1;
                    self.journal_failure(&record, &message).await;
                }
            }
        }

        for record in self
            .ledger
            .past_grace(self.settings.removal_tolerance_days)
            .await?
        {
            match self
                .ledger
                .remove(record.id(), RemovalReason::PaymentOverdueAutomatic)
                .await
            {
                Ok(outcome) if outcome.is_applied() => summary.removed += 1,
                Ok(_) => {}
                Err(err) => {
                    summary.failed += 1;
                    self.journal_failure(&record, &err.message()).await;
                }
            }
        }

        tracing::info!(
            warned = summary.warned,
            removed = summary.removed,
            failed = summary.failed,
            "Removal sweep finished"
        );
        Ok(summary)
    }

    /// Sends the grace notice, then stamps the record. A failed delivery
    /// leaves the record unstamped so the next sweep tries again.
    async fn warn(
        &self,
        record: &MembershipRecord,
        titles: &mut HashMap<IntegrationId, String>,
    ) -> Result<bool, String> {
        let Some(user_id) = record.chat_user_id() else {
            return Ok(false);
        };

        let title = match titles.get(&record.integration_id()) {
            Some(title) => title.clone(),
            None => {
                let title = self
                    .integrations
                    .find_by_id(record.integration_id())
                    .await
                    .map_err(|e| e.to_string())?
                    .map(|i| i.group().title.clone())
                    .unwrap_or_else(|| "the supporters group".to_string());
                titles.insert(record.integration_id(), title.clone());
                title
            }
        };

        let text = format!(
            "We could not confirm this month's payment for your support. \
             Please check your payment within {} hours to keep your place in {}.",
            self.settings.warning_grace_hours, title
        );
        self.gateway
            .send_direct_message(user_id, &text)
            .await
            .map_err(|e| format!("grace notice failed: {}", e))?;

        let outcome = self
            .ledger
            .mark_warned(record.id())
            .await
            .map_err(|e| e.message())?;
        Ok(outcome.is_applied())
    }

    async fn journal_failure(&self, record: &MembershipRecord, message: &str) {
        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::error(message)
                .with_integration(record.integration_id())
                .with_member(record.id())
                .with_metadata(json!({ "stage": "reconciliation" })),
        )
        .await;
    }
}

enum Settled {
    Overdue,
    Recovered,
    Removed,
    Unchanged,
}

enum RecordFailure {
    /// Stops the job; later records would fail the same way.
    Fatal(ReconciliationError),
    /// Journaled; the batch moves on.
    Skipped(String),
}

impl From<AccessError> for RecordFailure {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Configuration(message) => {
                RecordFailure::Fatal(ReconciliationError::Configuration(message))
            }
            other => RecordFailure::Skipped(other.to_string()),
        }
    }
}

fn applied(
    result: Result<Transition, MembershipError>,
    settled: Settled,
) -> Result<Settled, RecordFailure> {
    match result {
        Ok(outcome) if outcome.is_applied() => Ok(settled),
        Ok(_) => Ok(Settled::Unchanged),
        Err(err) => Err(RecordFailure::Skipped(err.message())),
    }
}
