//! IntegrationAdmin - operator actions on existing integrations.
//!
//! Integrations are never hard-deleted: `delete` deactivates and makes the
//! bot leave the group, the row and its members stay for the journal.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind, IntegrationId, Timestamp};
use crate::domain::integration::{AccessPolicy, ApiKey, Integration};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::ports::{CampaignCatalog, EventJournal, IntegrationRepository, MessagingGateway};

use super::journal_best_effort;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    #[error("Integration {0} not found")]
    IntegrationNotFound(IntegrationId),

    #[error("Campaign has no tier '{0}'")]
    UnknownTier(String),

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl AdminError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AdminError::IntegrationNotFound(_) => ErrorCode::IntegrationNotFound,
            AdminError::UnknownTier(_) => ErrorCode::ValidationFailed,
            AdminError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<DomainError> for AdminError {
    fn from(err: DomainError) -> Self {
        AdminError::Infrastructure(err.to_string())
    }
}

pub struct IntegrationAdmin {
    integrations: Arc<dyn IntegrationRepository>,
    catalog: Arc<dyn CampaignCatalog>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
}

impl IntegrationAdmin {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        catalog: Arc<dyn CampaignCatalog>,
        gateway: Arc<dyn MessagingGateway>,
        journal: Arc<dyn EventJournal>,
    ) -> Self {
        Self {
            integrations,
            catalog,
            gateway,
            journal,
        }
    }

    pub async fn activate(&self, id: IntegrationId) -> Result<Integration, AdminError> {
        let mut integration = self.load(id).await?;
        if integration.activate(Timestamp::now()) {
            self.save(&integration, json!({ "change": "activated" })).await?;
        }
        Ok(integration)
    }

    /// Stops gating the group. Members are left in place; reconciliation
    /// skips inactive integrations.
    pub async fn deactivate(&self, id: IntegrationId) -> Result<Integration, AdminError> {
        let mut integration = self.load(id).await?;
        if integration.deactivate(Timestamp::now()) {
            self.save(&integration, json!({ "change": "deactivated" })).await?;
        }
        Ok(integration)
    }

    pub async fn rotate_api_key(&self, id: IntegrationId) -> Result<ApiKey, AdminError> {
        let mut integration = self.load(id).await?;
        let key = integration.rotate_api_key(Timestamp::now()).clone();
        self.save(&integration, json!({ "change": "api_key_rotated" })).await?;
        Ok(key)
    }

    /// Sets the minimum tier, or opens the group to every paying supporter
    /// when `tier_id` is `None`. The amount is re-read from the catalog.
    pub async fn update_policy(
        &self,
        id: IntegrationId,
        tier_id: Option<&str>,
    ) -> Result<Integration, AdminError> {
        let mut integration = self.load(id).await?;
        let policy = match tier_id {
            None => AccessPolicy::Open,
            Some(tier_id) => {
                let catalog = self.catalog.tiers(integration.campaign_id()).await?;
                let tier = catalog
                    .find(tier_id)
                    .ok_or_else(|| AdminError::UnknownTier(tier_id.to_string()))?;
                AccessPolicy::minimum(tier)
            }
        };

        integration.set_policy(policy, Timestamp::now());
        self.save(
            &integration,
            json!({ "change": "policy", "tier_id": integration.policy().tier_id() }),
        )
        .await?;
        Ok(integration)
    }

    /// Deactivates the integration and makes the bot leave the group.
    pub async fn delete(&self, id: IntegrationId) -> Result<Integration, AdminError> {
        let mut integration = self.load(id).await?;
        integration.deactivate(Timestamp::now());
        self.integrations.update(&integration).await?;

        if let Err(err) = self.gateway.leave_chat(integration.chat_id()).await {
            tracing::warn!(
                integration_id = %id,
                chat_id = %integration.chat_id(),
                error = %err,
                "Could not leave group of deleted integration"
            );
        }

        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::new(JournalEventType::IntegrationDeleted)
                .with_integration(id)
                .with_metadata(json!({ "chat_id": integration.chat_id() })),
        )
        .await;
        tracing::info!(integration_id = %id, "Integration deleted");
        Ok(integration)
    }

    async fn load(&self, id: IntegrationId) -> Result<Integration, AdminError> {
        self.integrations
            .find_by_id(id)
            .await?
            .ok_or(AdminError::IntegrationNotFound(id))
    }

    async fn save(&self, integration: &Integration, change: serde_json::Value) -> Result<(), AdminError> {
        self.integrations.update(integration).await?;
        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::new(JournalEventType::IntegrationUpdated)
                .with_integration(integration.id())
                .with_metadata(change),
        )
        .await;
        tracing::info!(integration_id = %integration.id(), "Integration updated");
        Ok(())
    }
}
