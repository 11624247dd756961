//! GroupDiscoveryRegistry - groups where the bot is an administrator.
//!
//! Fed by the bot's own membership changes. The handshake consults it to list
//! candidate groups and to confirm a selection is still eligible.

use std::sync::Arc;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, Timestamp};
use crate::domain::groups::DiscoveredGroup;
use crate::ports::{DiscoveredGroupStore, GatewayError, MessagingGateway};

pub struct GroupDiscoveryRegistry {
    store: Arc<dyn DiscoveredGroupStore>,
    gateway: Arc<dyn MessagingGateway>,
}

impl GroupDiscoveryRegistry {
    pub fn new(store: Arc<dyn DiscoveredGroupStore>, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { store, gateway }
    }

    /// Reads the chat and the bot's rights in it from the transport and
    /// stores the result. Groups where the bot cannot gate are stored too,
    /// flagged ineligible.
    pub async fn observe(&self, chat_id: ChatId) -> Result<DiscoveredGroup, DomainError> {
        let chat = self.gateway.fetch_chat(chat_id).await.map_err(gateway_error)?;
        let bot = self.gateway.bot_user_id().await.map_err(gateway_error)?;
        let permissions = self
            .gateway
            .fetch_membership(chat_id, bot)
            .await
            .map_err(gateway_error)?;

        let group = DiscoveredGroup::from_observation(chat, permissions, Timestamp::now());
        self.store.upsert(&group).await?;

        tracing::info!(
            chat_id = %chat_id,
            title = %group.title,
            eligible = group.is_eligible(),
            "Group observed"
        );
        Ok(group)
    }

    /// Drops a group the bot left or was removed from.
    pub async fn forget(&self, chat_id: ChatId) -> Result<(), DomainError> {
        self.store.delete(chat_id).await?;
        tracing::info!(chat_id = %chat_id, "Group forgotten");
        Ok(())
    }

    /// Stored entry for `chat_id`, falling back to the transport when the
    /// registry has never seen the group.
    pub async fn lookup(&self, chat_id: ChatId) -> Result<Option<DiscoveredGroup>, DomainError> {
        if let Some(group) = self.store.find(chat_id).await? {
            return Ok(Some(group));
        }
        match self.observe(chat_id).await {
            Ok(group) => Ok(Some(group)),
            Err(err) if err.code == ErrorCode::GroupNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Re-reads a known group from the transport, forgetting it if the
    /// transport no longer knows it.
    pub async fn revalidate(&self, chat_id: ChatId) -> Result<Option<DiscoveredGroup>, DomainError> {
        match self.observe(chat_id).await {
            Ok(group) => Ok(Some(group)),
            Err(err) if err.code == ErrorCode::GroupNotFound => {
                self.forget(chat_id).await?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn list_eligible(&self) -> Result<Vec<DiscoveredGroup>, DomainError> {
        self.store.list_eligible().await
    }
}

fn gateway_error(err: GatewayError) -> DomainError {
    DomainError::new(err.code(), err.to_string())
}
