//! In-memory integration repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, IntegrationId};
use crate::domain::integration::Integration;
use crate::ports::IntegrationRepository;

/// Enforces the one-group-one-integration constraint the same way the
/// Postgres unique index does.
#[derive(Debug, Default)]
pub struct InMemoryIntegrationRepository {
    integrations: RwLock<HashMap<IntegrationId, Integration>>,
}

impl InMemoryIntegrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryIntegrationRepository {
    async fn create(&self, integration: &Integration) -> Result<(), DomainError> {
        let mut integrations = self.integrations.write().await;
        if integrations
            .values()
            .any(|existing| existing.chat_id() == integration.chat_id())
        {
            return Err(DomainError::new(
                ErrorCode::GroupAlreadyBound,
                format!("Group {} is already bound to an integration", integration.chat_id()),
            ));
        }
        integrations.insert(integration.id(), integration.clone());
        Ok(())
    }

    async fn update(&self, integration: &Integration) -> Result<(), DomainError> {
        let mut integrations = self.integrations.write().await;
        match integrations.get_mut(&integration.id()) {
            Some(slot) => {
                *slot = integration.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::IntegrationNotFound,
                format!("Integration {} not found", integration.id()),
            )),
        }
    }

    async fn find_by_id(&self, id: IntegrationId) -> Result<Option<Integration>, DomainError> {
        Ok(self.integrations.read().await.get(&id).cloned())
    }

    async fn find_by_chat(&self, chat_id: ChatId) -> Result<Option<Integration>, DomainError> {
        Ok(self
            .integrations
            .read()
            .await
            .values()
            .find(|i| i.chat_id() == chat_id)
            .cloned())
    }

    async fn find_active_by_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Integration>, DomainError> {
        let mut found: Vec<Integration> = self
            .integrations
            .read()
            .await
            .values()
            .filter(|i| i.is_active() && i.campaign_id() == campaign_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.created_at());
        Ok(found)
    }

    async fn list_active(&self) -> Result<Vec<Integration>, DomainError> {
        let mut found: Vec<Integration> = self
            .integrations
            .read()
            .await
            .values()
            .filter(|i| i.is_active())
            .cloned()
            .collect();
        found.sort_by_key(|i| i.created_at());
        Ok(found)
    }
}
