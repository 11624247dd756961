//! PlatformWebhookHandler - applies supporter and payment events pushed by
//! the crowdfunding platform.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::domain::access::AccessDecision;
use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind};
use crate::domain::integration::Integration;
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::domain::membership::{Email, MembershipError, MembershipStatus, RemovalReason};
use crate::domain::webhook::{PlatformEvent, SupporterPayload, WebhookError, WebhookSignatureVerifier};
use crate::ports::{EventJournal, IntegrationRepository};

use super::{journal_best_effort, AccessVerifier, InviteIssuer, MembershipLedger};

/// What an event did, for the HTTP layer to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    InvitesIssued { issued: usize, denied: usize, failed: usize },
    MembersRemoved { removed: usize },
    PaymentRecovered { updated: usize },
    PaymentOverdue { updated: usize },
    Ignored { event: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookHandlingError {
    #[error(transparent)]
    Rejected(#[from] WebhookError),

    #[error("Invalid supporter e-mail '{0}'")]
    InvalidEmail(String),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl WebhookHandlingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WebhookHandlingError::Rejected(WebhookError::ParseError(_))
            | WebhookHandlingError::InvalidEmail(_) => ErrorCode::ValidationFailed,
            WebhookHandlingError::Rejected(_) => ErrorCode::InvalidSignature,
            WebhookHandlingError::Membership(err) => err.code(),
            WebhookHandlingError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<DomainError> for WebhookHandlingError {
    fn from(err: DomainError) -> Self {
        WebhookHandlingError::Infrastructure(err.to_string())
    }
}

pub struct PlatformWebhookHandler {
    signatures: WebhookSignatureVerifier,
    integrations: Arc<dyn IntegrationRepository>,
    verifier: Arc<AccessVerifier>,
    ledger: Arc<MembershipLedger>,
    invites: Arc<InviteIssuer>,
    journal: Arc<dyn EventJournal>,
}

impl PlatformWebhookHandler {
    pub fn new(
        signatures: WebhookSignatureVerifier,
        integrations: Arc<dyn IntegrationRepository>,
        verifier: Arc<AccessVerifier>,
        ledger: Arc<MembershipLedger>,
        invites: Arc<InviteIssuer>,
        journal: Arc<dyn EventJournal>,
    ) -> Self {
        Self {
            signatures,
            integrations,
            verifier,
            ledger,
            invites,
            journal,
        }
    }

    /// Verifies the signature over the raw body, then parses and applies
    /// the event. Nothing is read from the body before the signature passes.
    pub async fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookHandlingError> {
        self.signatures.verify(body, signature)?;
        let event = PlatformEvent::parse(body)?;

        let outcome = match event {
            PlatformEvent::SupporterUpserted(payload) => self.supporter_upserted(&payload).await?,
            PlatformEvent::SupporterCancelled(payload) => {
                self.supporter_cancelled(&payload).await?
            }
            PlatformEvent::PaymentSucceeded(payload) => self.payment_succeeded(&payload).await?,
            PlatformEvent::PaymentFailed(payload) => self.payment_failed(&payload).await?,
            PlatformEvent::Unknown(name) => {
                tracing::debug!(event = %name, "Ignoring platform event");
                WebhookOutcome::Ignored { event: name }
            }
        };

        tracing::info!(outcome = ?outcome, "Platform webhook handled");
        Ok(outcome)
    }

    async fn supporter_upserted(
        &self,
        payload: &SupporterPayload,
    ) -> Result<WebhookOutcome, WebhookHandlingError> {
        let email = parse_email(payload)?;
        let (mut issued, mut denied, mut failed) = (0, 0, 0);

        for integration in self.integrations_of(payload).await? {
            let decision = match self.verifier.check_integration(&integration, &email).await {
                Ok(decision) => decision,
                Err(err) => {
                    failed += 1;
                    self.journal_failure(&integration, payload, &err.to_string()).await;
                    continue;
                }
            };

            match decision {
                AccessDecision::Granted(grant) => {
                    match self.invites.issue(&grant, payload.supporter_id.clone()).await {
                        Ok(_) => issued += 1,
                        Err(err) => {
                            failed += 1;
                            self.journal_failure(&integration, payload, &err.to_string()).await;
                        }
                    }
                }
                AccessDecision::Denied(reason) => {
                    denied += 1;
                    tracing::info!(
                        integration_id = %integration.id(),
                        reason = %reason,
                        "Supporter not admitted"
                    );
                }
            }
        }

        Ok(WebhookOutcome::InvitesIssued {
            issued,
            denied,
            failed,
        })
    }

    async fn supporter_cancelled(
        &self,
        payload: &SupporterPayload,
    ) -> Result<WebhookOutcome, WebhookHandlingError> {
        let email = parse_email(payload)?;
        let mut removed = 0;

        for integration in self.integrations_of(payload).await? {
            if let Some(record) = self.ledger.find_by_email(integration.id(), &email).await? {
                let outcome = self
                    .ledger
                    .remove(record.id(), RemovalReason::SupporterCancelled)
                    .await?;
                if outcome.is_applied() {
                    removed += 1;
                }
            }
        }

        Ok(WebhookOutcome::MembersRemoved { removed })
    }

    async fn payment_succeeded(
        &self,
        payload: &SupporterPayload,
    ) -> Result<WebhookOutcome, WebhookHandlingError> {
        let email = parse_email(payload)?;
        let mut updated = 0;

        for integration in self.integrations_of(payload).await? {
            let Some(record) = self.ledger.find_by_email(integration.id(), &email).await? else {
                continue;
            };
            if record.status() == MembershipStatus::PaymentOverdue
                && self.ledger.mark_recovered(record.id()).await?.is_applied()
            {
                updated += 1;
            }
        }

        Ok(WebhookOutcome::PaymentRecovered { updated })
    }

    async fn payment_failed(
        &self,
        payload: &SupporterPayload,
    ) -> Result<WebhookOutcome, WebhookHandlingError> {
        let email = parse_email(payload)?;
        let mut updated = 0;

        for integration in self.integrations_of(payload).await? {
            let Some(record) = self.ledger.find_by_email(integration.id(), &email).await? else {
                continue;
            };
            if record.status() == MembershipStatus::Active
                && self.ledger.mark_overdue(record.id()).await?.is_applied()
            {
                updated += 1;
            }
        }

        Ok(WebhookOutcome::PaymentOverdue { updated })
    }

    async fn integrations_of(
        &self,
        payload: &SupporterPayload,
    ) -> Result<Vec<Integration>, WebhookHandlingError> {
        let integrations = self
            .integrations
            .find_active_by_campaign(&payload.campaign_id)
            .await?;
        if integrations.is_empty() {
            tracing::debug!(campaign_id = %payload.campaign_id, "No active integration for campaign");
        }
        Ok(integrations)
    }

    async fn journal_failure(&self, integration: &Integration, payload: &SupporterPayload, message: &str) {
        tracing::warn!(
            integration_id = %integration.id(),
            error = %message,
            "Webhook processing failed for integration"
        );
        let mut entry = JournalEntry::new(JournalEventType::Error)
            .with_integration(integration.id())
            .with_error(message)
            .with_metadata(json!({ "stage": "platform_webhook" }));
        if let Some(supporter_id) = &payload.supporter_id {
            entry = entry.with_external_user(supporter_id);
        }
        journal_best_effort(self.journal.as_ref(), entry).await;
    }
}

fn parse_email(payload: &SupporterPayload) -> Result<Email, WebhookHandlingError> {
    Email::parse(&payload.supporter_email)
        .map_err(|_| WebhookHandlingError::InvalidEmail(payload.supporter_email.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{email, Harness, CAMPAIGN_ID};

    fn body(event: &str, addr: &str) -> Vec<u8> {
        json!({
            "event": event,
            "data": {
                "supporterId": "s-1",
                "supporterEmail": addr,
                "campaignId": CAMPAIGN_ID,
            }
        })
        .to_string()
        .into_bytes()
    }

    async fn deliver(h: &Harness, event: &str, addr: &str) -> Result<WebhookOutcome, WebhookHandlingError> {
        let body = body(event, addr);
        let signature = h.webhook_signature(&body);
        h.webhooks.handle(&body, Some(&signature)).await
    }

    #[tokio::test]
    async fn bad_signature_processes_nothing() {
        let h = Harness::new().await;
        h.provider.set_paid("ana@b.io", 1500).await;
        let body = body("supporter.created", "ana@b.io");

        let err = h.webhooks.handle(&body, Some("deadbeef")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(h.provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let h = Harness::new().await;
        let err = h
            .webhooks
            .handle(&body("supporter.created", "ana@b.io"), None)
            .await
            .unwrap_err();
        assert_eq!(err, WebhookHandlingError::Rejected(WebhookError::MissingSignature));
    }

    #[tokio::test]
    async fn new_supporter_with_access_gets_invite() {
        let h = Harness::new().await;
        h.provider.set_paid("ana@b.io", 1500).await;

        let outcome = deliver(&h, "supporter.created", "ana@b.io").await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::InvitesIssued { issued: 1, denied: 0, failed: 0 }
        );
        let record = h
            .ledger
            .find_by_email(h.integration.id(), &email("ana@b.io"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.external_subscriber_id(), Some("s-1"));
        assert!(record.invite().is_some());
    }

    #[tokio::test]
    async fn denial_is_not_an_error() {
        let h = Harness::new().await;
        h.provider.set_paid("cheap@b.io", 500).await;

        let outcome = deliver(&h, "supporter.updated", "cheap@b.io").await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::InvitesIssued { issued: 0, denied: 1, failed: 0 }
        );
        assert_eq!(h.journal.count_of(JournalEventType::Error).await, 0);
    }

    #[tokio::test]
    async fn cancellation_removes_member() {
        let h = Harness::new().await;
        let record = h.seed_active("ana@b.io", 42).await;

        let outcome = deliver(&h, "supporter.cancelled", "ana@b.io").await.unwrap();

        assert_eq!(outcome, WebhookOutcome::MembersRemoved { removed: 1 });
        let stored = h.ledger.find(record.id()).await.unwrap().unwrap();
        assert_eq!(stored.removal_reason(), Some(&RemovalReason::SupporterCancelled));
    }

    #[tokio::test]
    async fn payment_failure_then_success_round_trips_status() {
        let h = Harness::new().await;
        let record = h.seed_active("ana@b.io", 42).await;

        let failed = deliver(&h, "payment.failed", "ana@b.io").await.unwrap();
        assert_eq!(failed, WebhookOutcome::PaymentOverdue { updated: 1 });
        assert_eq!(
            h.ledger.find(record.id()).await.unwrap().unwrap().status(),
            MembershipStatus::PaymentOverdue
        );

        let succeeded = deliver(&h, "payment.succeeded", "ana@b.io").await.unwrap();
        assert_eq!(succeeded, WebhookOutcome::PaymentRecovered { updated: 1 });
        let stored = h.ledger.find(record.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), MembershipStatus::Active);
        assert!(stored.removal_warning_at().is_none());
    }

    #[tokio::test]
    async fn payment_success_for_active_member_changes_nothing() {
        let h = Harness::new().await;
        h.seed_active("ana@b.io", 42).await;

        let outcome = deliver(&h, "payment.succeeded", "ana@b.io").await.unwrap();

        assert_eq!(outcome, WebhookOutcome::PaymentRecovered { updated: 0 });
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let h = Harness::new().await;
        let outcome = deliver(&h, "campaign.updated", "ana@b.io").await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored { event: "campaign.updated".into() }
        );
    }

    #[tokio::test]
    async fn malformed_email_is_a_validation_error() {
        let h = Harness::new().await;
        let err = deliver(&h, "payment.failed", "not-an-email").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
