//! MembershipLedger - the single writer of membership records.
//!
//! Every state change goes through here so that each one is persisted and
//! journaled the same way, whether it came from a webhook, the bot or the
//! reconciliation pass. The ledger never decides access; callers hand it a
//! decision already made.

use std::sync::Arc;

use serde_json::json;

use crate::domain::foundation::{ChatUserId, IntegrationId, MembershipId, Timestamp};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::domain::membership::{
    Email, InviteToken, MembershipError, MembershipRecord, MembershipStatus, RemovalReason,
    Transition,
};
use crate::ports::{EventJournal, IntegrationRepository, MembershipRepository, MessagingGateway};

use super::journal_best_effort;

pub struct MembershipLedger {
    records: Arc<dyn MembershipRepository>,
    integrations: Arc<dyn IntegrationRepository>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
}

impl MembershipLedger {
    pub fn new(
        records: Arc<dyn MembershipRepository>,
        integrations: Arc<dyn IntegrationRepository>,
        gateway: Arc<dyn MessagingGateway>,
        journal: Arc<dyn EventJournal>,
    ) -> Self {
        Self {
            records,
            integrations,
            gateway,
            journal,
        }
    }

    /// Returns the record for (integration, email), creating it or bringing a
    /// removed one back to pending verification.
    pub async fn create_or_reactivate(
        &self,
        integration_id: IntegrationId,
        email: &Email,
        external_subscriber_id: Option<String>,
    ) -> Result<MembershipRecord, MembershipError> {
        let now = Timestamp::now();

        if let Some(existing) = self
            .records
            .find_by_integration_and_email(integration_id, email)
            .await?
        {
            return self.reactivate(existing, external_subscriber_id, now).await;
        }

        let record =
            MembershipRecord::new(integration_id, email.clone(), external_subscriber_id.clone(), now);
        if self.records.insert(&record).await? {
            tracing::info!(
                membership_id = %record.id(),
                integration_id = %integration_id,
                "Membership record created"
            );
            return Ok(record);
        }

        // Lost an insert race on (integration, email); the winner's row is
        // the record.
        let existing = self
            .records
            .find_by_integration_and_email(integration_id, email)
            .await?
            .ok_or_else(|| {
                MembershipError::infrastructure("membership insert conflicted but no row found")
            })?;
        self.reactivate(existing, external_subscriber_id, now).await
    }

    async fn reactivate(
        &self,
        mut record: MembershipRecord,
        external_subscriber_id: Option<String>,
        now: Timestamp,
    ) -> Result<MembershipRecord, MembershipError> {
        if record.reactivate(external_subscriber_id, now)?.is_applied() {
            self.records.update(&record).await?;
        }
        Ok(record)
    }

    /// Links a chat account to the supporter's record and activates it.
    ///
    /// Returns `None` when no record exists for (integration, email).
    pub async fn link_identity(
        &self,
        integration_id: IntegrationId,
        email: &Email,
        user_id: ChatUserId,
        handle: Option<String>,
    ) -> Result<Option<MembershipRecord>, MembershipError> {
        let Some(mut record) = self
            .records
            .find_by_integration_and_email(integration_id, email)
            .await?
        else {
            return Ok(None);
        };

        record.link_identity(user_id, handle.clone(), Timestamp::now())?;
        self.records.update(&record).await?;

        self.journal(
            JournalEntry::new(JournalEventType::MemberVerified)
                .with_integration(integration_id)
                .with_member(record.id())
                .with_external_user(user_id)
                .with_metadata(json!({ "handle": handle })),
        )
        .await;

        Ok(Some(record))
    }

    pub async fn mark_overdue(&self, id: MembershipId) -> Result<Transition, MembershipError> {
        let mut record = self.load(id).await?;
        let outcome = record.mark_overdue(Timestamp::now())?;
        if outcome.is_applied() {
            self.records.update(&record).await?;
            self.journal(member_entry(JournalEventType::PaymentOverdue, &record))
                .await;
        }
        Ok(outcome)
    }

    pub async fn mark_recovered(&self, id: MembershipId) -> Result<Transition, MembershipError> {
        let mut record = self.load(id).await?;
        let outcome = record.mark_recovered(Timestamp::now())?;
        if outcome.is_applied() {
            self.records.update(&record).await?;
            self.journal(member_entry(JournalEventType::PaymentRecovered, &record))
                .await;
        }
        Ok(outcome)
    }

    pub async fn mark_warned(&self, id: MembershipId) -> Result<Transition, MembershipError> {
        let mut record = self.load(id).await?;
        let outcome = record.mark_warned(Timestamp::now())?;
        if outcome.is_applied() {
            self.records.update(&record).await?;
            self.journal(member_entry(JournalEventType::WarningSent, &record))
                .await;
        }
        Ok(outcome)
    }

    /// Removes a member.
    ///
    /// The record is marked removed and persisted before the transport is
    /// asked to kick the user. A failed kick is journaled as an error and
    /// does not undo the local removal.
    pub async fn remove(
        &self,
        id: MembershipId,
        reason: RemovalReason,
    ) -> Result<Transition, MembershipError> {
        let mut record = self.load(id).await?;
        let outcome = record.remove(reason.clone(), Timestamp::now());
        if !outcome.is_applied() {
            return Ok(outcome);
        }

        self.records.update(&record).await?;
        self.journal(
            member_entry(JournalEventType::MemberRemoved, &record)
                .with_metadata(json!({ "reason": reason.as_str() })),
        )
        .await;

        if let Some(user_id) = record.chat_user_id() {
            self.kick(&record, user_id).await;
        }

        tracing::info!(
            membership_id = %record.id(),
            reason = %reason,
            "Member removed"
        );
        Ok(outcome)
    }

    async fn kick(&self, record: &MembershipRecord, user_id: ChatUserId) {
        let integration = match self.integrations.find_by_id(record.integration_id()).await {
            Ok(Some(integration)) => integration,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "Could not load integration for kick");
                return;
            }
        };

        if let Err(err) = self.gateway.remove_member(integration.chat_id(), user_id).await {
            tracing::warn!(
                membership_id = %record.id(),
                chat_id = %integration.chat_id(),
                error = %err,
                "Failed to remove member from group"
            );
            self.journal(
                JournalEntry::error(format!("kick failed: {}", err))
                    .with_integration(record.integration_id())
                    .with_member(record.id())
                    .with_external_user(user_id),
            )
            .await;
        }
    }

    /// Records that a linked user left the group on their own.
    ///
    /// Returns `None` when the user has no live record in the integration.
    /// No kick is attempted; the user is already gone.
    pub async fn record_departure(
        &self,
        integration_id: IntegrationId,
        user_id: ChatUserId,
    ) -> Result<Option<Transition>, MembershipError> {
        let Some(mut record) = self.records.find_by_chat_user(integration_id, user_id).await? else {
            return Ok(None);
        };

        let outcome = record.remove(RemovalReason::LeftVoluntarily, Timestamp::now());
        if outcome.is_applied() {
            self.records.update(&record).await?;
            self.journal(
                member_entry(JournalEventType::MemberRemoved, &record)
                    .with_metadata(json!({ "reason": RemovalReason::LeftVoluntarily.as_str() })),
            )
            .await;
        }
        Ok(Some(outcome))
    }

    /// The record holding `token`, if the token is still valid.
    pub async fn find_by_invite_token(
        &self,
        token: &str,
    ) -> Result<Option<MembershipRecord>, MembershipError> {
        let now = Timestamp::now();
        Ok(self
            .records
            .find_by_invite_token(token)
            .await?
            .filter(|record| record.invite_matches(token, now)))
    }

    pub async fn attach_invite(
        &self,
        id: MembershipId,
        invite: InviteToken,
    ) -> Result<MembershipRecord, MembershipError> {
        let mut record = self.load(id).await?;
        record.issue_invite(invite, Timestamp::now());
        self.records.update(&record).await?;
        Ok(record)
    }

    pub async fn find(&self, id: MembershipId) -> Result<Option<MembershipRecord>, MembershipError> {
        Ok(self.records.find_by_id(id).await?)
    }

    pub async fn find_by_email(
        &self,
        integration_id: IntegrationId,
        email: &Email,
    ) -> Result<Option<MembershipRecord>, MembershipError> {
        Ok(self
            .records
            .find_by_integration_and_email(integration_id, email)
            .await?)
    }

    /// Records the reconciliation pass re-verifies.
    pub async fn needing_reconciliation(
        &self,
        integration_id: IntegrationId,
    ) -> Result<Vec<MembershipRecord>, MembershipError> {
        Ok(self
            .records
            .list_by_statuses(
                integration_id,
                &[MembershipStatus::Active, MembershipStatus::PaymentOverdue],
            )
            .await?)
    }

    pub async fn needing_warning(&self) -> Result<Vec<MembershipRecord>, MembershipError> {
        Ok(self.records.list_overdue_unwarned().await?)
    }

    /// Overdue records whose last check is older than `tolerance_days`.
    pub async fn past_grace(
        &self,
        tolerance_days: i64,
    ) -> Result<Vec<MembershipRecord>, MembershipError> {
        let now = Timestamp::now();
        let records = self
            .records
            .list_overdue_checked_before(now.minus_days(tolerance_days))
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.is_past_grace(now, tolerance_days))
            .collect())
    }

    async fn load(&self, id: MembershipId) -> Result<MembershipRecord, MembershipError> {
        self.records
            .find_by_id(id)
            .await?
            .ok_or_else(|| MembershipError::not_found(id))
    }

    async fn journal(&self, entry: JournalEntry) {
        journal_best_effort(self.journal.as_ref(), entry).await;
    }
}

fn member_entry(event_type: JournalEventType, record: &MembershipRecord) -> JournalEntry {
    let entry = JournalEntry::new(event_type)
        .with_integration(record.integration_id())
        .with_member(record.id());
    match record.chat_user_id() {
        Some(user_id) => entry.with_external_user(user_id),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        FailingOp, InMemoryIntegrationRepository, InMemoryJournal, InMemoryMembershipRepository,
        RecordingGateway,
    };
    use crate::application::test_support::{active_integration, email};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        ledger: MembershipLedger,
        records: Arc<InMemoryMembershipRepository>,
        gateway: Arc<RecordingGateway>,
        journal: Arc<InMemoryJournal>,
        integration_id: IntegrationId,
    }

    async fn fixture() -> Fixture {
        let records = Arc::new(InMemoryMembershipRepository::new());
        let integrations = Arc::new(InMemoryIntegrationRepository::new());
        let gateway = Arc::new(RecordingGateway::default());
        let journal = Arc::new(InMemoryJournal::new());

        let integration = active_integration(-100);
        integrations.create(&integration).await.unwrap();

        Fixture {
            ledger: MembershipLedger::new(
                records.clone(),
                integrations,
                gateway.clone(),
                journal.clone(),
            ),
            records,
            gateway,
            journal,
            integration_id: integration.id(),
        }
    }

    async fn linked(f: &Fixture, addr: &str, user: i64) -> MembershipRecord {
        f.ledger
            .create_or_reactivate(f.integration_id, &email(addr), None)
            .await
            .unwrap();
        f.ledger
            .link_identity(f.integration_id, &email(addr), ChatUserId::new(user), None)
            .await
            .unwrap()
            .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_starts_pending() {
        let f = fixture().await;
        let record = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ana@b.io"), Some("sub-1".into()))
            .await
            .unwrap();

        assert_eq!(record.status(), MembershipStatus::PendingVerification);
        assert_eq!(record.external_subscriber_id(), Some("sub-1"));
    }

    #[tokio::test]
    async fn create_twice_returns_the_same_record() {
        let f = fixture().await;
        let first = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ana@b.io"), None)
            .await
            .unwrap();
        let second = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ANA@b.io"), None)
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(f.records.all().await.len(), 1);
    }

    #[tokio::test]
    async fn removed_record_is_reused_on_return() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;
        f.ledger
            .remove(record.id(), RemovalReason::SupporterCancelled)
            .await
            .unwrap();

        let back = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ana@b.io"), None)
            .await
            .unwrap();

        assert_eq!(back.id(), record.id());
        assert_eq!(back.status(), MembershipStatus::PendingVerification);
        assert!(back.removal_reason().is_none());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Transitions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn link_activates_and_journals() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;

        assert_eq!(record.status(), MembershipStatus::Active);
        assert_eq!(record.chat_user_id(), Some(ChatUserId::new(42)));
        assert_eq!(f.journal.count_of(JournalEventType::MemberVerified).await, 1);
    }

    #[tokio::test]
    async fn link_without_record_is_none() {
        let f = fixture().await;
        let outcome = f
            .ledger
            .link_identity(f.integration_id, &email("ghost@b.io"), ChatUserId::new(1), None)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn overdue_then_recovered_journals_each_change_once() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;

        assert!(f.ledger.mark_overdue(record.id()).await.unwrap().is_applied());
        assert!(!f.ledger.mark_overdue(record.id()).await.unwrap().is_applied());
        assert!(f.ledger.mark_recovered(record.id()).await.unwrap().is_applied());

        assert_eq!(f.journal.count_of(JournalEventType::PaymentOverdue).await, 1);
        assert_eq!(f.journal.count_of(JournalEventType::PaymentRecovered).await, 1);
    }

    #[tokio::test]
    async fn warning_requires_overdue() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;

        let err = f.ledger.mark_warned(record.id()).await.unwrap_err();
        assert!(matches!(err, MembershipError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let f = fixture().await;
        let err = f.ledger.mark_overdue(MembershipId::new()).await.unwrap_err();
        assert!(matches!(err, MembershipError::NotFound(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Removal
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn remove_kicks_linked_member() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;

        f.ledger
            .remove(record.id(), RemovalReason::SubscriberNotFound)
            .await
            .unwrap();

        assert_eq!(
            f.gateway.removals().await,
            vec![(crate::domain::foundation::ChatId::new(-100), ChatUserId::new(42))]
        );
        assert_eq!(f.journal.count_of(JournalEventType::MemberRemoved).await, 1);
    }

    #[tokio::test]
    async fn failed_kick_keeps_local_removal_and_journals_error() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;
        f.gateway.fail(FailingOp::Remove).await;

        let outcome = f
            .ledger
            .remove(record.id(), RemovalReason::PaymentOverdueAutomatic)
            .await
            .unwrap();

        assert!(outcome.is_applied());
        let stored = f.ledger.find(record.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), MembershipStatus::Removed);
        assert_eq!(f.journal.count_of(JournalEventType::Error).await, 1);
    }

    #[tokio::test]
    async fn removing_twice_is_unchanged() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;

        f.ledger.remove(record.id(), RemovalReason::SupporterCancelled).await.unwrap();
        let again = f
            .ledger
            .remove(record.id(), RemovalReason::SupporterCancelled)
            .await
            .unwrap();

        assert_eq!(again, Transition::Unchanged);
        assert_eq!(f.gateway.removals().await.len(), 1);
    }

    #[tokio::test]
    async fn departure_removes_without_kick() {
        let f = fixture().await;
        linked(&f, "ana@b.io", 42).await;

        let outcome = f
            .ledger
            .record_departure(f.integration_id, ChatUserId::new(42))
            .await
            .unwrap();

        assert_eq!(outcome, Some(Transition::Applied));
        assert!(f.gateway.removals().await.is_empty());
        let record = f.ledger.find_by_email(f.integration_id, &email("ana@b.io")).await.unwrap().unwrap();
        assert_eq!(record.removal_reason(), Some(&RemovalReason::LeftVoluntarily));
    }

    #[tokio::test]
    async fn departure_of_unknown_user_is_none() {
        let f = fixture().await;
        let outcome = f
            .ledger
            .record_departure(f.integration_id, ChatUserId::new(9))
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Invites and Queries
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn expired_invite_token_is_not_found() {
        let f = fixture().await;
        let record = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ana@b.io"), None)
            .await
            .unwrap();
        let expired = InviteToken::generate(Timestamp::now().minus_hours(1));
        let token = expired.token.clone();
        f.ledger.attach_invite(record.id(), expired).await.unwrap();

        assert!(f.ledger.find_by_invite_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn valid_invite_token_resolves_record() {
        let f = fixture().await;
        let record = f
            .ledger
            .create_or_reactivate(f.integration_id, &email("ana@b.io"), None)
            .await
            .unwrap();
        let invite = InviteToken::generate(Timestamp::now().plus_secs(3600));
        let token = invite.token.clone();
        f.ledger.attach_invite(record.id(), invite).await.unwrap();

        let found = f.ledger.find_by_invite_token(&token).await.unwrap().unwrap();
        assert_eq!(found.id(), record.id());
    }

    #[tokio::test]
    async fn reconciliation_excludes_pending_and_removed() {
        let f = fixture().await;
        let active = linked(&f, "active@b.io", 1).await;
        let overdue = linked(&f, "overdue@b.io", 2).await;
        f.ledger.mark_overdue(overdue.id()).await.unwrap();
        let gone = linked(&f, "gone@b.io", 3).await;
        f.ledger.remove(gone.id(), RemovalReason::SupporterCancelled).await.unwrap();
        f.ledger
            .create_or_reactivate(f.integration_id, &email("pending@b.io"), None)
            .await
            .unwrap();

        let mut ids: Vec<_> = f
            .ledger
            .needing_reconciliation(f.integration_id)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id())
            .collect();
        ids.sort_by_key(|id| id.to_string());
        let mut expected = vec![active.id(), overdue.id()];
        expected.sort_by_key(|id| id.to_string());

        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn freshly_overdue_is_not_past_grace() {
        let f = fixture().await;
        let record = linked(&f, "ana@b.io", 42).await;
        f.ledger.mark_overdue(record.id()).await.unwrap();

        assert_eq!(f.ledger.needing_warning().await.unwrap().len(), 1);
        assert!(f.ledger.past_grace(7).await.unwrap().is_empty());
    }
}
