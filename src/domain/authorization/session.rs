//! Authorization session: a finite-state value driven by [`transition`].
//!
//! The session never mutates itself through its operations. Each handshake
//! step is a [`SessionEvent`], and `transition` returns the next session or
//! the reason the step is not allowed. The caller persists the result.
//!
//! ```text
//! pending ─► identity_confirmed ─► group_selected ─► tier_selected ─► completed
//!    │               │                   │                 │
//!    └───────────────┴───────────────────┴─────────────────┴──► expired | error
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::campaign::Tier;
use crate::domain::foundation::{
    ChatId, ChatUserId, IntegrationId, StateMachine, Timestamp, ValidationError,
};

use super::SessionError;

/// Default lifetime of a handshake.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 30;

/// Opaque, unguessable handshake token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// 32 random bytes, base64url without padding.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handshake status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    IdentityConfirmed,
    GroupSelected,
    TierSelected,
    Completed,
    Expired,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::IdentityConfirmed => "identity_confirmed",
            SessionStatus::GroupSelected => "group_selected",
            SessionStatus::TierSelected => "tier_selected",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "identity_confirmed" => Ok(SessionStatus::IdentityConfirmed),
            "group_selected" => Ok(SessionStatus::GroupSelected),
            "tier_selected" => Ok(SessionStatus::TierSelected),
            "completed" => Ok(SessionStatus::Completed),
            "expired" => Ok(SessionStatus::Expired),
            "error" => Ok(SessionStatus::Error),
            other => Err(ValidationError::invalid_format(
                "session_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        match (self, target) {
            (Pending, IdentityConfirmed)
            | (IdentityConfirmed, GroupSelected)
            | (GroupSelected, TierSelected)
            | (TierSelected, Completed) => true,
            (from, Expired) | (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionStatus::*;
        match self {
            Pending => vec![IdentityConfirmed, Expired, Error],
            IdentityConfirmed => vec![GroupSelected, Expired, Error],
            GroupSelected => vec![TierSelected, Expired, Error],
            TierSelected => vec![Completed, Expired, Error],
            Completed | Expired | Error => vec![],
        }
    }
}

/// Credentials the maker's platform session handed to the handshake.
#[derive(Debug, Clone)]
pub struct TemporaryCredentials {
    pub api_key: String,
    pub bearer_token: SecretString,
}

/// Chat account that completed the login widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIdentity {
    pub user_id: ChatUserId,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedGroup {
    pub chat_id: ChatId,
    pub title: String,
}

/// One handshake step.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ConfirmIdentity(ChatIdentity),
    SelectGroup(SelectedGroup),
    /// `None` admits every supporter.
    SelectTier(Option<Tier>),
    Complete(IntegrationId),
    Fail(String),
    Cancel,
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::ConfirmIdentity(_) => "confirm_identity",
            SessionEvent::SelectGroup(_) => "select_group",
            SessionEvent::SelectTier(_) => "select_tier",
            SessionEvent::Complete(_) => "complete",
            SessionEvent::Fail(_) => "fail",
            SessionEvent::Cancel => "cancel",
        }
    }
}

/// Short-lived handshake binding one campaign to one group.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    token: SessionToken,
    campaign_slug: String,
    campaign_id: String,
    maker_id: String,
    redirect_uri: String,
    credentials: TemporaryCredentials,
    identity: Option<ChatIdentity>,
    group: Option<SelectedGroup>,
    tier: Option<Tier>,
    status: SessionStatus,
    error_message: Option<String>,
    integration_id: Option<IntegrationId>,
    created_at: Timestamp,
    updated_at: Timestamp,
    expires_at: Timestamp,
}

impl AuthorizationSession {
    /// Start a pending session with a fresh token.
    pub fn start(
        campaign_slug: impl Into<String>,
        campaign_id: impl Into<String>,
        maker_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        credentials: TemporaryCredentials,
        now: Timestamp,
        ttl_minutes: i64,
    ) -> Self {
        Self {
            token: SessionToken::generate(),
            campaign_slug: campaign_slug.into(),
            campaign_id: campaign_id.into(),
            maker_id: maker_id.into(),
            redirect_uri: redirect_uri.into(),
            credentials,
            identity: None,
            group: None,
            tier: None,
            status: SessionStatus::Pending,
            error_message: None,
            integration_id: None,
            created_at: now,
            updated_at: now,
            expires_at: now.plus_minutes(ttl_minutes),
        }
    }

    /// Reconstitute a session from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        token: SessionToken,
        campaign_slug: String,
        campaign_id: String,
        maker_id: String,
        redirect_uri: String,
        credentials: TemporaryCredentials,
        identity: Option<ChatIdentity>,
        group: Option<SelectedGroup>,
        tier: Option<Tier>,
        status: SessionStatus,
        error_message: Option<String>,
        integration_id: Option<IntegrationId>,
        created_at: Timestamp,
        updated_at: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            token,
            campaign_slug,
            campaign_id,
            maker_id,
            redirect_uri,
            credentials,
            identity,
            group,
            tier,
            status,
            error_message,
            integration_id,
            created_at,
            updated_at,
            expires_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn campaign_slug(&self) -> &str {
        &self.campaign_slug
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn maker_id(&self) -> &str {
        &self.maker_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn credentials(&self) -> &TemporaryCredentials {
        &self.credentials
    }

    pub fn identity(&self) -> Option<&ChatIdentity> {
        self.identity.as_ref()
    }

    pub fn group(&self) -> Option<&SelectedGroup> {
        self.group.as_ref()
    }

    pub fn tier(&self) -> Option<&Tier> {
        self.tier.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn integration_id(&self) -> Option<IntegrationId> {
        self.integration_id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validity
    // ─────────────────────────────────────────────────────────────────────────

    /// Valid iff non-terminal and not yet expired.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        !self.status.is_terminal() && now.is_before(&self.expires_at)
    }

    pub fn ensure_valid(&self, now: Timestamp) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::Invalid { status: self.status });
        }
        if !now.is_before(&self.expires_at) {
            return Err(SessionError::Invalid {
                status: SessionStatus::Expired,
            });
        }
        Ok(())
    }

    /// The expired form of this session, if it lapsed while non-terminal.
    pub fn expired(&self, now: Timestamp) -> Option<Self> {
        if self.status.is_terminal() || now.is_before(&self.expires_at) {
            return None;
        }
        let mut next = self.clone();
        next.status = SessionStatus::Expired;
        next.updated_at = now;
        Some(next)
    }
}

/// Applies one handshake step.
///
/// `Cancel` is accepted from every status. `Fail` is accepted from every
/// non-terminal status. Every other step first requires a valid session and
/// then its exact predecessor status.
pub fn transition(
    session: &AuthorizationSession,
    event: SessionEvent,
    now: Timestamp,
) -> Result<AuthorizationSession, SessionError> {
    let mut next = session.clone();
    next.updated_at = now;

    match event {
        SessionEvent::Cancel => {
            if session.status == SessionStatus::Error {
                return Ok(session.clone());
            }
            next.status = SessionStatus::Error;
            next.error_message = Some("cancelled".to_string());
            Ok(next)
        }
        SessionEvent::Fail(message) => {
            if session.status.is_terminal() {
                return Err(SessionError::Invalid {
                    status: session.status,
                });
            }
            next.status = SessionStatus::Error;
            next.error_message = Some(message);
            Ok(next)
        }
        step => {
            session.ensure_valid(now)?;
            let (expected, target) = match &step {
                SessionEvent::ConfirmIdentity(_) => {
                    (SessionStatus::Pending, SessionStatus::IdentityConfirmed)
                }
                SessionEvent::SelectGroup(_) => {
                    (SessionStatus::IdentityConfirmed, SessionStatus::GroupSelected)
                }
                SessionEvent::SelectTier(_) => {
                    (SessionStatus::GroupSelected, SessionStatus::TierSelected)
                }
                SessionEvent::Complete(_) => (SessionStatus::TierSelected, SessionStatus::Completed),
                SessionEvent::Fail(_) | SessionEvent::Cancel => {
                    return Err(SessionError::Infrastructure(format!(
                        "unexpected step {}",
                        step.name()
                    )))
                }
            };
            if session.status != expected {
                return Err(SessionError::WrongStatus {
                    expected,
                    actual: session.status,
                });
            }
            next.status = session
                .status
                .transition_to(target)
                .map_err(|e| SessionError::Infrastructure(e.message))?;

            match step {
                SessionEvent::ConfirmIdentity(identity) => next.identity = Some(identity),
                SessionEvent::SelectGroup(group) => next.group = Some(group),
                SessionEvent::SelectTier(tier) => next.tier = tier,
                SessionEvent::Complete(integration_id) => {
                    next.integration_id = Some(integration_id)
                }
                SessionEvent::Fail(_) | SessionEvent::Cancel => {}
            }
            Ok(next)
        }
    }
}
