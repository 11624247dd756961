//! AuthorizationSessionManager - drives the connect-a-group handshake.
//!
//! Each step loads the session, applies the pure [`transition`] and saves the
//! result. Side effects (credential checks, proof verification, transport
//! calls) happen before the transition, so a rejected step never moves the
//! session forward.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::domain::authorization::{
    transition, AuthorizationSession, IdentityProof, IdentityVerifier, SelectedGroup,
    SessionError, SessionEvent, SessionStatus, SessionToken, TemporaryCredentials,
};
use crate::domain::foundation::{ChatId, ErrorCode, Timestamp};
use crate::domain::integration::{AccessPolicy, GroupBinding, Integration, ProviderCredentials};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::ports::{
    CampaignCatalog, CredentialExchangeStore, CredentialGrant, EventJournal, GatewayError,
    IntegrationRepository, MessagingGateway, SessionRepository,
};

use super::{journal_best_effort, GroupDiscoveryRegistry};

/// Collaborators of the session manager.
pub struct SessionManagerDeps {
    pub sessions: Arc<dyn SessionRepository>,
    pub credentials: Arc<dyn CredentialExchangeStore>,
    pub catalog: Arc<dyn CampaignCatalog>,
    pub registry: Arc<GroupDiscoveryRegistry>,
    pub integrations: Arc<dyn IntegrationRepository>,
    pub gateway: Arc<dyn MessagingGateway>,
    pub journal: Arc<dyn EventJournal>,
}

pub struct AuthorizationSessionManager {
    sessions: Arc<dyn SessionRepository>,
    credentials: Arc<dyn CredentialExchangeStore>,
    catalog: Arc<dyn CampaignCatalog>,
    registry: Arc<GroupDiscoveryRegistry>,
    integrations: Arc<dyn IntegrationRepository>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
    verifier: IdentityVerifier,
    ttl_minutes: i64,
}

impl AuthorizationSessionManager {
    pub fn new(deps: SessionManagerDeps, verifier: IdentityVerifier, ttl_minutes: i64) -> Self {
        Self {
            sessions: deps.sessions,
            credentials: deps.credentials,
            catalog: deps.catalog,
            registry: deps.registry,
            integrations: deps.integrations,
            gateway: deps.gateway,
            journal: deps.journal,
            verifier,
            ttl_minutes,
        }
    }

    /// Starts a handshake from the temporary credentials the platform issued
    /// when the maker clicked "connect".
    ///
    /// # Errors
    ///
    /// - `Validation` - empty slug or redirect
    /// - `InvalidCredentials` - unknown api key, bearer mismatch, or the
    ///   credentials belong to another campaign
    /// - `CampaignNotFound`
    pub async fn initiate(
        &self,
        campaign_slug: &str,
        api_key: &str,
        bearer_token: SecretString,
        redirect_uri: &str,
    ) -> Result<AuthorizationSession, SessionError> {
        if campaign_slug.trim().is_empty() {
            return Err(SessionError::Validation("campaign slug is required".into()));
        }
        if redirect_uri.trim().is_empty() {
            return Err(SessionError::Validation("redirect uri is required".into()));
        }

        let grant = self
            .credentials
            .get(api_key)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;
        if !bearer_matches(&grant, &bearer_token) || grant.campaign_slug != campaign_slug {
            tracing::warn!(campaign_slug, "Temporary credentials rejected");
            return Err(SessionError::InvalidCredentials);
        }

        let campaign = self
            .catalog
            .find_by_slug(campaign_slug)
            .await?
            .ok_or_else(|| SessionError::CampaignNotFound(campaign_slug.to_string()))?;

        let session = AuthorizationSession::start(
            campaign.slug,
            campaign.id,
            grant.maker_id,
            redirect_uri,
            TemporaryCredentials {
                api_key: api_key.to_string(),
                bearer_token,
            },
            Timestamp::now(),
            self.ttl_minutes,
        );
        self.sessions.save(&session).await?;

        tracing::info!(campaign_slug, "Authorization session started");
        Ok(session)
    }

    /// Current view of a session. A session that lapsed is stored as expired
    /// and returned in that form.
    pub async fn get(&self, token: &SessionToken) -> Result<AuthorizationSession, SessionError> {
        let session = self.find(token).await?;
        match session.expired(Timestamp::now()) {
            Some(expired) => {
                self.sessions.save(&expired).await?;
                Ok(expired)
            }
            None => Ok(session),
        }
    }

    /// Verifies the login-widget proof and records the chat identity.
    ///
    /// A rejected proof leaves the session untouched.
    pub async fn confirm_identity(
        &self,
        token: &SessionToken,
        proof: &IdentityProof,
    ) -> Result<AuthorizationSession, SessionError> {
        let session = self.load_active(token).await?;
        let now = Timestamp::now();
        let identity = self.verifier.verify(proof, now)?;
        self.apply(&session, SessionEvent::ConfirmIdentity(identity), now)
            .await
    }

    /// Records the destination group. The bot must administer it.
    pub async fn select_group(
        &self,
        token: &SessionToken,
        chat_id: ChatId,
        title: &str,
    ) -> Result<AuthorizationSession, SessionError> {
        let session = self.load_active(token).await?;

        let eligible = self
            .registry
            .lookup(chat_id)
            .await?
            .filter(|group| group.is_eligible());
        let Some(group) = eligible else {
            return Err(SessionError::Validation(format!(
                "group {} is not available; add the bot as an administrator first",
                chat_id
            )));
        };

        let title = if title.trim().is_empty() {
            group.title
        } else {
            title.trim().to_string()
        };
        self.apply(
            &session,
            SessionEvent::SelectGroup(SelectedGroup { chat_id, title }),
            Timestamp::now(),
        )
        .await
    }

    /// Records the minimum tier. `None` admits every supporter.
    pub async fn select_tier(
        &self,
        token: &SessionToken,
        tier_id: Option<&str>,
    ) -> Result<AuthorizationSession, SessionError> {
        let session = self.load_active(token).await?;

        let tier = match tier_id {
            Some(tier_id) => {
                let catalog = self.catalog.tiers(session.campaign_id()).await?;
                let tier = catalog.find(tier_id).cloned().ok_or_else(|| {
                    SessionError::Validation(format!("unknown tier '{}'", tier_id))
                })?;
                Some(tier)
            }
            None => None,
        };

        self.apply(&session, SessionEvent::SelectTier(tier), Timestamp::now())
            .await
    }

    /// Creates the integration and completes the session.
    ///
    /// Status errors are returned as they are. Any failure after the status
    /// check moves the session to `error` with the failure message.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` - the temporary credentials lapsed, no longer match,
    ///   the maker does not own the campaign, or the bot lacks admin rights
    /// - `GroupAlreadyBound`
    /// - `External` - the transport could not be reached
    pub async fn complete(
        &self,
        token: &SessionToken,
    ) -> Result<(AuthorizationSession, Integration), SessionError> {
        let session = self.load_active(token).await?;
        if session.status() != SessionStatus::TierSelected {
            return Err(SessionError::WrongStatus {
                expected: SessionStatus::TierSelected,
                actual: session.status(),
            });
        }

        let integration = match self.bind(&session).await {
            Ok(integration) => integration,
            Err(err) => {
                let failed = transition(&session, SessionEvent::Fail(err.to_string()), Timestamp::now())?;
                self.sessions.save(&failed).await?;
                tracing::warn!(
                    campaign_slug = session.campaign_slug(),
                    error = %err,
                    "Handshake completion failed"
                );
                return Err(err);
            }
        };

        let completed = self
            .apply(&session, SessionEvent::Complete(integration.id()), Timestamp::now())
            .await?;

        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::new(JournalEventType::IntegrationCreated)
                .with_integration(integration.id())
                .with_metadata(json!({
                    "campaign_slug": integration.campaign_slug(),
                    "chat_id": integration.chat_id(),
                    "created_by": integration.created_by(),
                })),
        )
        .await;

        tracing::info!(
            integration_id = %integration.id(),
            chat_id = %integration.chat_id(),
            "Integration created"
        );
        Ok((completed, integration))
    }

    async fn bind(&self, session: &AuthorizationSession) -> Result<Integration, SessionError> {
        let group = session
            .group()
            .cloned()
            .ok_or_else(|| SessionError::Infrastructure("session has no selected group".into()))?;

        // Ownership is re-resolved from the credential exchange store rather
        // than trusted from the session row.
        let grant = self
            .credentials
            .get(&session.credentials().api_key)
            .await?
            .ok_or_else(|| SessionError::Unauthorized("temporary credentials have lapsed".into()))?;
        if !bearer_matches(&grant, &session.credentials().bearer_token)
            || grant.campaign_slug != session.campaign_slug()
            || grant.maker_id != session.maker_id()
        {
            return Err(SessionError::Unauthorized(
                "temporary credentials no longer match this session".into(),
            ));
        }

        let campaign = self
            .catalog
            .find_by_id(session.campaign_id())
            .await?
            .ok_or_else(|| SessionError::CampaignNotFound(session.campaign_slug().to_string()))?;
        if !campaign.is_owned_by(&grant.maker_id) {
            return Err(SessionError::Unauthorized(
                "requester does not own this campaign".into(),
            ));
        }

        if self.integrations.find_by_chat(group.chat_id).await?.is_some() {
            return Err(SessionError::GroupAlreadyBound(group.chat_id));
        }

        let bot = self.gateway.bot_user_id().await.map_err(transport_error)?;
        let permissions = self
            .gateway
            .fetch_membership(group.chat_id, bot)
            .await
            .map_err(transport_error)?;
        if !permissions.can_gate() {
            return Err(SessionError::Unauthorized(
                "the bot needs administrator rights with invite and manage permissions".into(),
            ));
        }
        let chat = self
            .gateway
            .fetch_chat(group.chat_id)
            .await
            .map_err(transport_error)?;
        if !chat.kind.is_destination() {
            return Err(SessionError::Validation(format!(
                "a {} cannot be gated",
                chat.kind
            )));
        }

        let policy = session
            .tier()
            .map(AccessPolicy::minimum)
            .unwrap_or(AccessPolicy::Open);

        let integration = Integration::new(
            campaign.id,
            campaign.slug,
            grant.maker_id,
            GroupBinding {
                chat_id: group.chat_id,
                title: group.title,
                kind: chat.kind,
            },
            policy,
            ProviderCredentials {
                api_key: session.credentials().api_key.clone(),
                bearer_token: session.credentials().bearer_token.clone(),
            },
            Timestamp::now(),
        );

        self.integrations.create(&integration).await.map_err(|err| {
            if err.code == ErrorCode::GroupAlreadyBound {
                SessionError::GroupAlreadyBound(integration.chat_id())
            } else {
                SessionError::from(err)
            }
        })?;
        Ok(integration)
    }

    /// Moves the session to `error`. Repeating the call changes nothing.
    pub async fn cancel(&self, token: &SessionToken) -> Result<AuthorizationSession, SessionError> {
        let session = self.find(token).await?;
        let cancelled = transition(&session, SessionEvent::Cancel, Timestamp::now())?;
        if cancelled.status() != session.status() {
            self.sessions.save(&cancelled).await?;
            tracing::info!(campaign_slug = session.campaign_slug(), "Handshake cancelled");
        }
        Ok(cancelled)
    }

    /// Deletes sessions whose expiry is more than `retention_hours` old.
    pub async fn purge_expired(&self, retention_hours: i64) -> Result<u64, SessionError> {
        let cutoff = Timestamp::now().minus_hours(retention_hours);
        let purged = self.sessions.delete_expired_before(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, "Expired authorization sessions purged");
        }
        Ok(purged)
    }

    async fn find(&self, token: &SessionToken) -> Result<AuthorizationSession, SessionError> {
        self.sessions
            .find(token)
            .await?
            .ok_or(SessionError::NotFound)
    }

    /// Loads a session that can still move forward. A lapsed session is
    /// persisted as expired on this first access.
    async fn load_active(&self, token: &SessionToken) -> Result<AuthorizationSession, SessionError> {
        let session = self.find(token).await?;
        let now = Timestamp::now();
        if let Some(expired) = session.expired(now) {
            self.sessions.save(&expired).await?;
            return Err(SessionError::Invalid {
                status: SessionStatus::Expired,
            });
        }
        session.ensure_valid(now)?;
        Ok(session)
    }

    async fn apply(
        &self,
        session: &AuthorizationSession,
        event: SessionEvent,
        now: Timestamp,
    ) -> Result<AuthorizationSession, SessionError> {
        let next = transition(session, event, now)?;
        self.sessions.save(&next).await?;
        tracing::debug!(
            campaign_slug = next.campaign_slug(),
            status = %next.status(),
            "Authorization session advanced"
        );
        Ok(next)
    }
}

fn bearer_matches(grant: &CredentialGrant, presented: &SecretString) -> bool {
    grant
        .bearer_token
        .expose_secret()
        .as_bytes()
        .ct_eq(presented.expose_secret().as_bytes())
        .into()
}

fn transport_error(err: GatewayError) -> SessionError {
    match err {
        GatewayError::Forbidden(message) => SessionError::Unauthorized(message),
        GatewayError::NotFound(message) => {
            SessionError::Validation(format!("group not found: {}", message))
        }
        GatewayError::Transport(message) => SessionError::External(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::FailingOp;
    use crate::application::test_support::{Harness, FREE_CHAT, MAKER};
    use crate::domain::foundation::{ChatUserId, ErrorKind};
    use crate::domain::groups::{GroupKind, MemberPermissions};
    use std::collections::BTreeMap;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn proof(h: &Harness, age_secs: i64) -> IdentityProof {
        let auth_date = Timestamp::now().minus_secs(age_secs).as_unix_secs();
        let fields: BTreeMap<String, String> = [
            ("id", "4242".to_string()),
            ("first_name", "Mara".to_string()),
            ("username", "mara".to_string()),
            ("auth_date", auth_date.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        h.identity_verifier().sign(fields).unwrap()
    }

    async fn start(h: &Harness) -> SessionToken {
        h.handshake
            .initiate(
                "podcast-x",
                "temp-key",
                SecretString::new("temp-bearer".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap()
            .token()
            .clone()
    }

    async fn tier_selected(h: &Harness, chat: ChatId) -> SessionToken {
        let token = start(h).await;
        h.handshake.confirm_identity(&token, &proof(h, 10)).await.unwrap();
        h.handshake.select_group(&token, chat, "").await.unwrap();
        h.handshake.select_tier(&token, Some("silver")).await.unwrap();
        token
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Initiate
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn initiate_creates_pending_session() {
        let h = Harness::new().await;
        let session = h
            .handshake
            .initiate(
                "podcast-x",
                "temp-key",
                SecretString::new("temp-bearer".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap();

        assert_eq!(session.status(), SessionStatus::Pending);
        assert_eq!(session.maker_id(), MAKER);
        assert_eq!(h.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn initiate_rejects_wrong_bearer() {
        let h = Harness::new().await;
        let err = h
            .handshake
            .initiate(
                "podcast-x",
                "temp-key",
                SecretString::new("guess".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
    }

    #[tokio::test]
    async fn initiate_rejects_credentials_for_another_campaign() {
        let h = Harness::new().await;
        let err = h
            .handshake
            .initiate(
                "other-show",
                "temp-key",
                SecretString::new("temp-bearer".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
    }

    #[tokio::test]
    async fn initiate_rejects_lapsed_credentials() {
        let h = Harness::new().await;
        h.credentials.expire("temp-key").await;

        let err = h
            .handshake
            .initiate(
                "podcast-x",
                "temp-key",
                SecretString::new("temp-bearer".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Steps
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn stale_proof_leaves_status_unchanged() {
        let h = Harness::new().await;
        let token = start(&h).await;

        let err = h
            .handshake
            .confirm_identity(&token, &proof(&h, 400))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::ProofRejected(_)));
        assert_eq!(h.handshake.get(&token).await.unwrap().status(), SessionStatus::Pending);
    }

    #[tokio::test]
    async fn fresh_proof_confirms_identity() {
        let h = Harness::new().await;
        let token = start(&h).await;

        let session = h
            .handshake
            .confirm_identity(&token, &proof(&h, 120))
            .await
            .unwrap();

        assert_eq!(session.status(), SessionStatus::IdentityConfirmed);
        assert_eq!(session.identity().map(|i| i.user_id), Some(ChatUserId::new(4242)));
    }

    #[tokio::test]
    async fn steps_out_of_order_are_state_errors() {
        let h = Harness::new().await;
        let token = start(&h).await;

        let err = h
            .handshake
            .select_tier(&token, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[tokio::test]
    async fn ineligible_group_is_a_validation_error() {
        let h = Harness::new().await;
        h.gateway
            .add_chat(
                crate::application::test_support::chat_info(-300, GroupKind::Supergroup),
                MemberPermissions::default(),
            )
            .await;
        let token = start(&h).await;
        h.handshake.confirm_identity(&token, &proof(&h, 10)).await.unwrap();

        let err = h
            .handshake
            .select_group(&token, ChatId::new(-300), "Locked")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_tier_is_a_validation_error() {
        let h = Harness::new().await;
        let token = start(&h).await;
        h.handshake.confirm_identity(&token, &proof(&h, 10)).await.unwrap();
        h.handshake.select_group(&token, FREE_CHAT, "").await.unwrap();

        let err = h
            .handshake
            .select_tier(&token, Some("platinum"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Complete
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn complete_creates_integration_with_minimum_tier() {
        let h = Harness::new().await;
        let token = tier_selected(&h, FREE_CHAT).await;

        let (session, integration) = h.handshake.complete(&token).await.unwrap();

        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.integration_id(), Some(integration.id()));
        assert_eq!(integration.chat_id(), FREE_CHAT);
        assert_eq!(integration.policy().tier_id(), Some("silver"));
        assert_eq!(h.journal.count_of(JournalEventType::IntegrationCreated).await, 1);
    }

    #[tokio::test]
    async fn complete_twice_is_a_session_error() {
        let h = Harness::new().await;
        let token = tier_selected(&h, FREE_CHAT).await;
        h.handshake.complete(&token).await.unwrap();

        let err = h.handshake.complete(&token).await.unwrap_err();

        assert!(matches!(err, SessionError::Invalid { .. }));
    }

    #[tokio::test]
    async fn already_bound_group_fails_and_marks_error() {
        let h = Harness::new().await;
        let token = tier_selected(&h, h.integration.chat_id()).await;

        let err = h.handshake.complete(&token).await.unwrap_err();

        assert_eq!(err, SessionError::GroupAlreadyBound(h.integration.chat_id()));
        let session = h.handshake.get(&token).await.unwrap();
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(session.error_message().is_some());
    }

    #[tokio::test]
    async fn lapsed_credentials_fail_completion() {
        let h = Harness::new().await;
        let token = tier_selected(&h, FREE_CHAT).await;
        h.credentials.expire("temp-key").await;

        let err = h.handshake.complete(&token).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(h.integrations.find_by_chat(FREE_CHAT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_outage_fails_completion_as_external() {
        let h = Harness::new().await;
        let token = tier_selected(&h, FREE_CHAT).await;
        h.gateway.fail(FailingOp::FetchMembership).await;

        let err = h.handshake.complete(&token).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::External);
        assert_eq!(h.handshake.get(&token).await.unwrap().status(), SessionStatus::Error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancel and Purge
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancel_is_terminal_and_idempotent() {
        let h = Harness::new().await;
        let token = start(&h).await;

        let first = h.handshake.cancel(&token).await.unwrap();
        let second = h.handshake.cancel(&token).await.unwrap();

        assert_eq!(first.status(), SessionStatus::Error);
        assert_eq!(second.status(), SessionStatus::Error);
        let err = h
            .handshake
            .confirm_identity(&token, &proof(&h, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Invalid { .. }));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let h = Harness::new().await;
        let err = h
            .handshake
            .get(&SessionToken::from_string("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::NotFound);
    }

    #[tokio::test]
    async fn purge_keeps_recent_sessions() {
        let h = Harness::new().await;
        start(&h).await;

        let purged = h.handshake.purge_expired(24).await.unwrap();

        assert_eq!(purged, 0);
        assert_eq!(h.sessions.len().await, 1);
    }
}
