//! In-memory discovered group store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{ChatId, DomainError};
use crate::domain::groups::DiscoveredGroup;
use crate::ports::DiscoveredGroupStore;

#[derive(Debug, Default)]
pub struct InMemoryGroupStore {
    groups: RwLock<HashMap<ChatId, DiscoveredGroup>>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscoveredGroupStore for InMemoryGroupStore {
    async fn upsert(&self, group: &DiscoveredGroup) -> Result<(), DomainError> {
        self.groups.write().await.insert(group.chat_id, group.clone());
        Ok(())
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<DiscoveredGroup>, DomainError> {
        Ok(self.groups.read().await.get(&chat_id).cloned())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<(), DomainError> {
        self.groups.write().await.remove(&chat_id);
        Ok(())
    }

    async fn list_eligible(&self) -> Result<Vec<DiscoveredGroup>, DomainError> {
        let mut eligible: Vec<DiscoveredGroup> = self
            .groups
            .read()
            .await
            .values()
            .filter(|g| g.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(eligible)
    }
}
