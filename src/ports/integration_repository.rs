//! Integration repository port.
//!
//! # Design
//!
//! - **One group, one integration**: `create` must reject a second integration
//!   for the same chat id with `GroupAlreadyBound`, even when two handshakes
//!   race past the application pre-check
//! - **Soft delete**: integrations are deactivated, never removed

use crate::domain::foundation::{ChatId, DomainError, IntegrationId};
use crate::domain::integration::Integration;
use async_trait::async_trait;

/// Repository port for Integration aggregate persistence.
#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// Persist a new integration.
    ///
    /// # Errors
    ///
    /// - `GroupAlreadyBound` if the chat id is already bound
    /// - `DatabaseError` on persistence failure
    async fn create(&self, integration: &Integration) -> Result<(), DomainError>;

    /// Update an existing integration.
    ///
    /// # Errors
    ///
    /// - `IntegrationNotFound` if the integration doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, integration: &Integration) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: IntegrationId) -> Result<Option<Integration>, DomainError>;

    /// Find the integration bound to a chat, active or not.
    async fn find_by_chat(&self, chat_id: ChatId) -> Result<Option<Integration>, DomainError>;

    /// Active integrations of one campaign. A campaign may gate several groups.
    async fn find_active_by_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Integration>, DomainError>;

    /// All active integrations, oldest first.
    async fn list_active(&self) -> Result<Vec<Integration>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn IntegrationRepository) {}
    }
}
