//! In-memory membership repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{
    ChatUserId, DomainError, ErrorCode, IntegrationId, MembershipId, Timestamp,
};
use crate::domain::membership::{Email, MembershipRecord, MembershipStatus};
use crate::ports::MembershipRepository;

#[derive(Debug, Default)]
pub struct InMemoryMembershipRepository {
    records: RwLock<HashMap<MembershipId, MembershipRecord>>,
}

impl InMemoryMembershipRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, for assertions.
    pub async fn all(&self) -> Vec<MembershipRecord> {
        self.records.read().await.values().cloned().collect()
    }

    async fn filtered<F>(&self, predicate: F) -> Vec<MembershipRecord>
    where
        F: Fn(&MembershipRecord) -> bool,
    {
        let mut found: Vec<MembershipRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at());
        found
    }
}

#[async_trait]
impl MembershipRepository for InMemoryMembershipRepository {
    async fn insert(&self, record: &MembershipRecord) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        let duplicate = records.values().any(|existing| {
            existing.integration_id() == record.integration_id()
                && existing.email() == record.email()
        });
        if duplicate {
            return Ok(false);
        }
        records.insert(record.id(), record.clone());
        Ok(true)
    }

    async fn update(&self, record: &MembershipRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::MemberNotFound,
                format!("Membership {} not found", record.id()),
            )),
        }
    }

    async fn find_by_id(&self, id: MembershipId) -> Result<Option<MembershipRecord>, DomainError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_integration_and_email(
        &self,
        integration_id: IntegrationId,
        email: &Email,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        Ok(self
            .filtered(|r| r.integration_id() == integration_id && r.email() == email)
            .await
            .into_iter()
            .next())
    }

    async fn find_by_invite_token(
        &self,
        token: &str,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        Ok(self
            .filtered(|r| r.invite().map(|i| i.token.as_str()) == Some(token))
            .await
            .into_iter()
            .next())
    }

    async fn find_by_chat_user(
        &self,
        integration_id: IntegrationId,
        user_id: ChatUserId,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        Ok(self
            .filtered(|r| {
                r.integration_id() == integration_id
                    && r.chat_user_id() == Some(user_id)
                    && r.status() != MembershipStatus::Removed
            })
            .await
            .into_iter()
            .next())
    }

    async fn list_by_statuses(
        &self,
        integration_id: IntegrationId,
        statuses: &[MembershipStatus],
    ) -> Result<Vec<MembershipRecord>, DomainError> {
        Ok(self
            .filtered(|r| r.integration_id() == integration_id && statuses.contains(&r.status()))
            .await)
    }

    async fn list_overdue_unwarned(&self) -> Result<Vec<MembershipRecord>, DomainError> {
        Ok(self.filtered(|r| r.needs_warning()).await)
    }

    async fn list_overdue_checked_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipRecord>, DomainError> {
        Ok(self
            .filtered(|r| {
                r.status() == MembershipStatus::PaymentOverdue
                    && r.last_payment_check().map_or(false, |t| t.is_before(&cutoff))
            })
            .await)
    }
}
