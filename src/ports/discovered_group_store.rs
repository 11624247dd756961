//! Discovered group store port.
//!
//! Persistent cache of the chats the bot sits in, used to offer eligible
//! destinations during the handshake. The cache survives restarts so that
//! group selection keeps working after a redeploy.

use crate::domain::foundation::{ChatId, DomainError};
use crate::domain::groups::DiscoveredGroup;
use async_trait::async_trait;

#[async_trait]
pub trait DiscoveredGroupStore: Send + Sync {
    /// Insert or replace the record for `group.chat_id`.
    async fn upsert(&self, group: &DiscoveredGroup) -> Result<(), DomainError>;

    async fn find(&self, chat_id: ChatId) -> Result<Option<DiscoveredGroup>, DomainError>;

    /// Delete the record. Deleting an unknown chat is not an error.
    async fn delete(&self, chat_id: ChatId) -> Result<(), DomainError>;

    /// Groups with invite and manage rights, ordered by title.
    async fn list_eligible(&self) -> Result<Vec<DiscoveredGroup>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovered_group_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn DiscoveredGroupStore) {}
    }
}
