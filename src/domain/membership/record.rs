//! Membership record aggregate.
//!
//! One record per (integration, supporter email). Every mutation takes the
//! current time explicitly and reports whether it changed anything, so the
//! reconciliation pass can re-run over the same records safely.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{
    ChatUserId, IntegrationId, MembershipId, StateMachine, Timestamp,
};

use super::{Email, MembershipError, MembershipStatus};

/// Outcome of a guarded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The record changed and must be persisted.
    Applied,
    /// The record was already in the requested state.
    Unchanged,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Why a member left the group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RemovalReason {
    SubscriberNotFound,
    PaymentOverdueAutomatic,
    SupporterCancelled,
    LeftVoluntarily,
    IntegrationDeactivated,
    Other(String),
}

impl RemovalReason {
    pub fn as_str(&self) -> &str {
        match self {
            RemovalReason::SubscriberNotFound => "subscriber_not_found",
            RemovalReason::PaymentOverdueAutomatic => "payment_overdue_automatic",
            RemovalReason::SupporterCancelled => "supporter_cancelled",
            RemovalReason::LeftVoluntarily => "left_voluntarily",
            RemovalReason::IntegrationDeactivated => "integration_deactivated",
            RemovalReason::Other(reason) => reason,
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for RemovalReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "subscriber_not_found" => RemovalReason::SubscriberNotFound,
            "payment_overdue_automatic" => RemovalReason::PaymentOverdueAutomatic,
            "supporter_cancelled" => RemovalReason::SupporterCancelled,
            "left_voluntarily" => RemovalReason::LeftVoluntarily,
            "integration_deactivated" => RemovalReason::IntegrationDeactivated,
            _ => RemovalReason::Other(value),
        }
    }
}

impl From<RemovalReason> for String {
    fn from(reason: RemovalReason) -> Self {
        reason.as_str().to_string()
    }
}

/// Single-use invitation token held on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteToken {
    pub token: String,
    pub expires_at: Timestamp,
}

impl InviteToken {
    /// Generates 32 random bytes, hex encoded.
    pub fn generate(expires_at: Timestamp) -> Self {
        let bytes: [u8; 32] = rand::random();
        Self {
            token: hex::encode(bytes),
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now.is_before(&self.expires_at)
    }
}

/// Linked chat account of a supporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIdentityLink {
    pub user_id: ChatUserId,
    pub handle: Option<String>,
}

/// Per-supporter standing within one integration's group.
///
/// # Invariants
///
/// - at most one non-removed record per (integration, email); storage
///   enforces uniqueness on the pair and removal reuses the row
/// - `removed_at` is set iff status is removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    id: MembershipId,
    integration_id: IntegrationId,
    email: Email,
    external_subscriber_id: Option<String>,
    identity: Option<ChatIdentityLink>,
    status: MembershipStatus,
    joined_at: Option<Timestamp>,
    verified_at: Option<Timestamp>,
    last_payment_check: Option<Timestamp>,
    removal_warning_at: Option<Timestamp>,
    removed_at: Option<Timestamp>,
    removal_reason: Option<RemovalReason>,
    invite: Option<InviteToken>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl MembershipRecord {
    /// Create a record awaiting verification.
    pub fn new(
        integration_id: IntegrationId,
        email: Email,
        external_subscriber_id: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: MembershipId::new(),
            integration_id,
            email,
            external_subscriber_id,
            identity: None,
            status: MembershipStatus::PendingVerification,
            joined_at: None,
            verified_at: None,
            last_payment_check: None,
            removal_warning_at: None,
            removed_at: None,
            removal_reason: None,
            invite: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitute a record from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: MembershipId,
        integration_id: IntegrationId,
        email: Email,
        external_subscriber_id: Option<String>,
        identity: Option<ChatIdentityLink>,
        status: MembershipStatus,
        joined_at: Option<Timestamp>,
        verified_at: Option<Timestamp>,
        last_payment_check: Option<Timestamp>,
        removal_warning_at: Option<Timestamp>,
        removed_at: Option<Timestamp>,
        removal_reason: Option<RemovalReason>,
        invite: Option<InviteToken>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            integration_id,
            email,
            external_subscriber_id,
            identity,
            status,
            joined_at,
            verified_at,
            last_payment_check,
            removal_warning_at,
            removed_at,
            removal_reason,
            invite,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> MembershipId {
        self.id
    }

    pub fn integration_id(&self) -> IntegrationId {
        self.integration_id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn external_subscriber_id(&self) -> Option<&str> {
        self.external_subscriber_id.as_deref()
    }

    pub fn identity(&self) -> Option<&ChatIdentityLink> {
        self.identity.as_ref()
    }

    pub fn chat_user_id(&self) -> Option<ChatUserId> {
        self.identity.as_ref().map(|i| i.user_id)
    }

    pub fn status(&self) -> MembershipStatus {
        self.status
    }

    pub fn joined_at(&self) -> Option<Timestamp> {
        self.joined_at
    }

    pub fn verified_at(&self) -> Option<Timestamp> {
        self.verified_at
    }

    pub fn last_payment_check(&self) -> Option<Timestamp> {
        self.last_payment_check
    }

    pub fn removal_warning_at(&self) -> Option<Timestamp> {
        self.removal_warning_at
    }

    pub fn removed_at(&self) -> Option<Timestamp> {
        self.removed_at
    }

    pub fn removal_reason(&self) -> Option<&RemovalReason> {
        self.removal_reason.as_ref()
    }

    pub fn invite(&self) -> Option<&InviteToken> {
        self.invite.as_ref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Overdue and not yet warned.
    pub fn needs_warning(&self) -> bool {
        self.status == MembershipStatus::PaymentOverdue && self.removal_warning_at.is_none()
    }

    /// Overdue with a last check older than `tolerance_days`.
    pub fn is_past_grace(&self, now: Timestamp, tolerance_days: i64) -> bool {
        if self.status != MembershipStatus::PaymentOverdue {
            return false;
        }
        let cutoff = now.minus_days(tolerance_days);
        self.last_payment_check
            .map_or(false, |checked| checked.is_before(&cutoff))
    }

    /// Whether `token` is this record's current, unexpired invite.
    pub fn invite_matches(&self, token: &str, now: Timestamp) -> bool {
        self.invite
            .as_ref()
            .map_or(false, |invite| invite.token == token && invite.is_valid_at(now))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Bring a removed record back to pending verification.
    ///
    /// A record in any other state only has its subscriber id refreshed.
    pub fn reactivate(
        &mut self,
        external_subscriber_id: Option<String>,
        now: Timestamp,
    ) -> Result<Transition, MembershipError> {
        let mut outcome = Transition::Unchanged;
        if external_subscriber_id.is_some() && external_subscriber_id != self.external_subscriber_id {
            self.external_subscriber_id = external_subscriber_id;
            outcome = Transition::Applied;
        }
        if self.status == MembershipStatus::Removed {
            self.status = self.guarded(MembershipStatus::PendingVerification, "reactivate")?;
            self.removed_at = None;
            self.removal_reason = None;
            self.removal_warning_at = None;
            outcome = Transition::Applied;
        }
        if outcome.is_applied() {
            self.updated_at = now;
        }
        Ok(outcome)
    }

    /// Attach the supporter's chat account and activate the record.
    pub fn link_identity(
        &mut self,
        user_id: ChatUserId,
        handle: Option<String>,
        now: Timestamp,
    ) -> Result<Transition, MembershipError> {
        match self.status {
            MembershipStatus::PendingVerification => {
                self.status = self.guarded(MembershipStatus::Active, "link")?;
            }
            MembershipStatus::Active => {}
            current => return Err(MembershipError::invalid_state(current, "link")),
        }
        self.identity = Some(ChatIdentityLink { user_id, handle });
        self.verified_at = Some(now);
        if self.joined_at.is_none() {
            self.joined_at = Some(now);
        }
        self.updated_at = now;
        Ok(Transition::Applied)
    }

    pub fn mark_overdue(&mut self, now: Timestamp) -> Result<Transition, MembershipError> {
        match self.status {
            MembershipStatus::PaymentOverdue => Ok(Transition::Unchanged),
            _ => {
                self.status = self.guarded(MembershipStatus::PaymentOverdue, "mark overdue")?;
                self.last_payment_check = Some(now);
                self.updated_at = now;
                Ok(Transition::Applied)
            }
        }
    }

    /// Back to active after a successful payment; clears the warning marker.
    pub fn mark_recovered(&mut self, now: Timestamp) -> Result<Transition, MembershipError> {
        match self.status {
            MembershipStatus::Active => Ok(Transition::Unchanged),
            MembershipStatus::PaymentOverdue => {
                self.status = self.guarded(MembershipStatus::Active, "recover")?;
                self.last_payment_check = Some(now);
                self.removal_warning_at = None;
                self.updated_at = now;
                Ok(Transition::Applied)
            }
            current => Err(MembershipError::invalid_state(current, "recover")),
        }
    }

    pub fn mark_warned(&mut self, now: Timestamp) -> Result<Transition, MembershipError> {
        if self.status != MembershipStatus::PaymentOverdue {
            return Err(MembershipError::invalid_state(self.status, "warn"));
        }
        if self.removal_warning_at.is_some() {
            return Ok(Transition::Unchanged);
        }
        self.removal_warning_at = Some(now);
        self.updated_at = now;
        Ok(Transition::Applied)
    }

    /// Any state → removed. Already removed records are left as they are.
    pub fn remove(&mut self, reason: RemovalReason, now: Timestamp) -> Transition {
        if self.status == MembershipStatus::Removed {
            return Transition::Unchanged;
        }
        self.status = MembershipStatus::Removed;
        self.removed_at = Some(now);
        self.removal_reason = Some(reason);
        self.invite = None;
        self.updated_at = now;
        Transition::Applied
    }

    /// Store a fresh invitation, replacing any previous one.
    pub fn issue_invite(&mut self, invite: InviteToken, now: Timestamp) {
        self.invite = Some(invite);
        self.updated_at = now;
    }

    fn guarded(
        &self,
        target: MembershipStatus,
        attempted: &'static str,
    ) -> Result<MembershipStatus, MembershipError> {
        self.status
            .transition_to(target)
            .map_err(|_| MembershipError::invalid_state(self.status, attempted))
    }
}
