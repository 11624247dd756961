//! In-memory event journal.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, IntegrationId};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::ports::EventJournal;

/// Journal that keeps entries in append order.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub async fn entries(&self) -> Vec<JournalEntry> {
        self.entries.read().await.clone()
    }

    pub async fn count_of(&self, event_type: JournalEventType) -> usize {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventJournal for InMemoryJournal {
    async fn append(&self, entry: JournalEntry) -> Result<(), DomainError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn list_for_integration(
        &self,
        integration_id: IntegrationId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, DomainError> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.integration_id == Some(integration_id))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
