//! InviteIssuer - turns an access grant into a single-use group invite.

use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use thiserror::Error;

use crate::domain::access::AccessGrant;
use crate::domain::foundation::{
    DomainError, ErrorCode, ErrorKind, IntegrationId, MembershipId, Timestamp,
};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::domain::membership::{InviteToken, MembershipError};
use crate::ports::{EventJournal, GatewayError, IntegrationRepository, MessagingGateway};

use super::{journal_best_effort, MembershipLedger};

/// Invite links handed out by [`InviteIssuer::issue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedInvite {
    pub membership_id: MembershipId,
    /// Token correlating the supporter's later `/start` with the record.
    pub token: String,
    pub link: String,
    pub expires_at: Timestamp,
    /// Whether the link was sent to the supporter's linked chat account.
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InviteError {
    #[error("Integration {0} not found")]
    IntegrationNotFound(IntegrationId),

    #[error("Integration {0} is not active")]
    IntegrationInactive(IntegrationId),

    #[error("Could not create invite link: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Membership(#[from] MembershipError),
}

impl InviteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            InviteError::IntegrationNotFound(_) => ErrorCode::IntegrationNotFound,
            InviteError::IntegrationInactive(_) => ErrorCode::IntegrationInactive,
            InviteError::Gateway(err) => err.code(),
            InviteError::Membership(err) => err.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<DomainError> for InviteError {
    fn from(err: DomainError) -> Self {
        InviteError::Membership(err.into())
    }
}

/// Issues invites and keeps the record's token in step with the link.
pub struct InviteIssuer {
    ledger: Arc<MembershipLedger>,
    integrations: Arc<dyn IntegrationRepository>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
    ttl_hours: i64,
}

impl InviteIssuer {
    pub fn new(
        ledger: Arc<MembershipLedger>,
        integrations: Arc<dyn IntegrationRepository>,
        gateway: Arc<dyn MessagingGateway>,
        journal: Arc<dyn EventJournal>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            ledger,
            integrations,
            gateway,
            journal,
            ttl_hours,
        }
    }

    /// Ensures a record exists for the grant, then creates a single-use
    /// invite link and stores its token on the record.
    ///
    /// A linked supporter also receives the link by direct message. A failed
    /// delivery leaves `delivered` false; the link is still returned.
    ///
    /// # Errors
    ///
    /// - `IntegrationInactive` if the integration was deactivated after the
    ///   grant was made
    /// - `Gateway` if the transport could not create the link
    pub async fn issue(
        &self,
        grant: &AccessGrant,
        external_subscriber_id: Option<String>,
    ) -> Result<IssuedInvite, InviteError> {
        let integration_id = grant.integration_id();
        let integration = self
            .integrations
            .find_by_id(integration_id)
            .await?
            .ok_or(InviteError::IntegrationNotFound(integration_id))?;
        if !integration.is_active() {
            return Err(InviteError::IntegrationInactive(integration_id));
        }

        let record = self
            .ledger
            .create_or_reactivate(integration_id, grant.email(), external_subscriber_id)
            .await?;

        let ttl = Duration::hours(self.ttl_hours);
        let expires_at = Timestamp::now().plus_secs(ttl.num_seconds());
        let link = self
            .gateway
            .create_single_use_invite(grant.chat_id(), ttl.num_seconds())
            .await?;

        let invite = InviteToken::generate(expires_at);
        let token = invite.token.clone();
        let record = self.ledger.attach_invite(record.id(), invite).await?;

        let delivered = match record.chat_user_id() {
            Some(user_id) => {
                let text = format!(
                    "Your access to {} is confirmed. Join here: {}\nThis link works once and expires in {} hours.",
                    integration.group().title,
                    link,
                    self.ttl_hours
                );
                match self.gateway.send_direct_message(user_id, &text).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(
                            membership_id = %record.id(),
                            error = %err,
                            "Invite link could not be delivered"
                        );
                        false
                    }
                }
            }
            None => false,
        };

        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::new(JournalEventType::InviteIssued)
                .with_integration(integration_id)
                .with_member(record.id())
                .with_metadata(json!({
                    "expires_at": expires_at,
                    "delivered": delivered,
                })),
        )
        .await;

        tracing::info!(
            membership_id = %record.id(),
            integration_id = %integration_id,
            delivered,
            "Invite issued"
        );

        Ok(IssuedInvite {
            membership_id: record.id(),
            token,
            link,
            expires_at,
            delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{FailingOp, GatewayCall};
    use crate::application::test_support::{email, Harness};
    use crate::domain::foundation::ChatUserId;
    use crate::domain::membership::MembershipStatus;

    async fn grant_for(h: &Harness, addr: &str) -> AccessGrant {
        h.provider.set_paid(addr, 1500).await;
        h.verifier
            .check_integration(&h.integration, &email(addr))
            .await
            .unwrap()
            .into_grant()
            .unwrap()
    }

    #[tokio::test]
    async fn issue_creates_pending_record_with_token() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;

        let invite = h.invites.issue(&grant, Some("sub-1".into())).await.unwrap();

        let record = h.ledger.find(invite.membership_id).await.unwrap().unwrap();
        assert_eq!(record.status(), MembershipStatus::PendingVerification);
        assert_eq!(record.invite().map(|i| i.token.clone()), Some(invite.token.clone()));
        assert!(!invite.delivered);
        assert_eq!(h.journal.count_of(JournalEventType::InviteIssued).await, 1);
    }

    #[tokio::test]
    async fn invite_is_single_use_and_expires_with_configured_ttl() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;

        h.invites.issue(&grant, None).await.unwrap();

        assert!(h.gateway.calls().await.contains(&GatewayCall::Invite {
            chat_id: h.integration.chat_id(),
            ttl_secs: 24 * 3600,
        }));
    }

    #[tokio::test]
    async fn reissue_replaces_previous_token() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;

        let first = h.invites.issue(&grant, None).await.unwrap();
        let second = h.invites.issue(&grant, None).await.unwrap();

        assert_eq!(first.membership_id, second.membership_id);
        assert_ne!(first.token, second.token);
        assert!(h.ledger.find_by_invite_token(&first.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn linked_supporter_receives_link_by_message() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;
        h.invites.issue(&grant, None).await.unwrap();
        h.ledger
            .link_identity(h.integration.id(), &email("ana@b.io"), ChatUserId::new(42), None)
            .await
            .unwrap();

        let invite = h.invites.issue(&grant, None).await.unwrap();

        assert!(invite.delivered);
        let messages = h.gateway.messages_to(ChatUserId::new(42)).await;
        assert!(messages.iter().any(|m| m.contains(&invite.link)));
    }

    #[tokio::test]
    async fn transport_failure_leaves_record_without_token() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;
        h.gateway.fail(FailingOp::Invite).await;

        let err = h.invites.issue(&grant, None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::External);
        let record = h
            .ledger
            .find_by_email(h.integration.id(), &email("ana@b.io"))
            .await
            .unwrap()
            .unwrap();
        assert!(record.invite().is_none());
    }

    #[tokio::test]
    async fn deactivated_integration_refuses_stale_grant() {
        let h = Harness::new().await;
        let grant = grant_for(&h, "ana@b.io").await;
        h.admin.deactivate(h.integration.id()).await.unwrap();

        let err = h.invites.issue(&grant, None).await.unwrap_err();

        assert_eq!(err, InviteError::IntegrationInactive(h.integration.id()));
    }
}
