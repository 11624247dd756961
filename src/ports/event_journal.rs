//! EventJournal port - append-only audit log.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, IntegrationId};
use crate::domain::journal::JournalEntry;

/// Port for the audit log.
///
/// Entries are never updated or deleted. Callers treat a failed append as
/// non-fatal: it is logged and the operation that produced it stands.
#[async_trait]
pub trait EventJournal: Send + Sync {
    async fn append(&self, entry: JournalEntry) -> Result<(), DomainError>;

    /// Most recent entries of one integration, newest first.
    async fn list_for_integration(
        &self,
        integration_id: IntegrationId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, DomainError>;
}
