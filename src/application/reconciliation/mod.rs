//! Reconciliation - scheduled re-verification of every member's entitlement.
//!
//! ## Pieces
//!
//! - [`ReconciliationJobs`] - the job bodies (full sync, removal sweep,
//!   session purge) and the on-demand `enqueue_sync`
//! - [`ReconciliationScheduler`] - turns cron fire times into queued jobs,
//!   claiming each fire time once across every running instance
//! - [`ReconciliationWorker`] - drains the durable queue
//!
//! Every job is idempotent: re-running one after a partial failure only
//! changes the records that were not settled the first time.

mod jobs;
mod scheduler;
mod worker;

pub use jobs::{JobOutcome, ReconciliationJobs, ReconciliationSettings, SweepSummary, SyncSummary};
pub use scheduler::{CronTrigger, ReconciliationScheduler, SchedulerConfig};
pub use worker::{ReconciliationWorker, WorkerConfig};

use thiserror::Error;

use crate::domain::authorization::SessionError;
use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind, IntegrationId};
use crate::domain::membership::MembershipError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("Integration {0} not found")]
    IntegrationNotFound(IntegrationId),

    /// The provider rejected the integration's credentials. Every record of
    /// the integration would fail the same way, so the job stops.
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("Invalid schedule '{expression}': {message}")]
    InvalidSchedule { expression: String, message: String },

    #[error("Job queue failed: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl ReconciliationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ReconciliationError::IntegrationNotFound(_) => ErrorCode::IntegrationNotFound,
            ReconciliationError::Configuration(_) | ReconciliationError::InvalidSchedule { .. } => {
                ErrorCode::ConfigurationError
            }
            ReconciliationError::Queue(_) => ErrorCode::CacheError,
            ReconciliationError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<DomainError> for ReconciliationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::CacheError => ReconciliationError::Queue(err.message),
            ErrorCode::ConfigurationError => ReconciliationError::Configuration(err.message),
            _ => ReconciliationError::Infrastructure(err.to_string()),
        }
    }
}

impl From<MembershipError> for ReconciliationError {
    fn from(err: MembershipError) -> Self {
        ReconciliationError::Infrastructure(err.message())
    }
}

impl From<SessionError> for ReconciliationError {
    fn from(err: SessionError) -> Self {
        ReconciliationError::Infrastructure(err.to_string())
    }
}

impl From<ReconciliationError> for DomainError {
    fn from(err: ReconciliationError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}
