//! Integration aggregate entity.
//!
//! An integration binds one campaign to exactly one destination group. It is
//! created when a maker completes the authorization handshake and is never
//! hard-deleted: deactivation only flips `is_active`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ChatId, IntegrationId, Timestamp};
use crate::domain::groups::GroupKind;

use super::AccessPolicy;

/// Rotate-able key identifying an integration to the maker's tooling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Generates a fresh key from 32 random bytes.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(STANDARD.encode(bytes))
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform credentials used to query the subscription provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub bearer_token: SecretString,
}

/// The destination group bound to an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBinding {
    pub chat_id: ChatId,
    pub title: String,
    pub kind: GroupKind,
}

/// Integration aggregate.
///
/// # Invariants
///
/// - `group.chat_id` is bound to at most one integration (enforced by storage)
/// - `created_by` owns the campaign identified by `campaign_id`
#[derive(Debug, Clone)]
pub struct Integration {
    id: IntegrationId,
    campaign_id: String,
    campaign_slug: String,
    created_by: String,
    group: GroupBinding,
    policy: AccessPolicy,
    api_key: ApiKey,
    credentials: ProviderCredentials,
    is_active: bool,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Integration {
    /// Create a new active integration with a freshly generated key.
    pub fn new(
        campaign_id: impl Into<String>,
        campaign_slug: impl Into<String>,
        created_by: impl Into<String>,
        group: GroupBinding,
        policy: AccessPolicy,
        credentials: ProviderCredentials,
        now: Timestamp,
    ) -> Self {
        Self {
            id: IntegrationId::new(),
            campaign_id: campaign_id.into(),
            campaign_slug: campaign_slug.into(),
            created_by: created_by.into(),
            group,
            policy,
            api_key: ApiKey::generate(),
            credentials,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstitute an integration from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: IntegrationId,
        campaign_id: String,
        campaign_slug: String,
        created_by: String,
        group: GroupBinding,
        policy: AccessPolicy,
        api_key: ApiKey,
        credentials: ProviderCredentials,
        is_active: bool,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            campaign_id,
            campaign_slug,
            created_by,
            group,
            policy,
            api_key,
            credentials,
            is_active,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> IntegrationId {
        self.id
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn campaign_slug(&self) -> &str {
        &self.campaign_slug
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn group(&self) -> &GroupBinding {
        &self.group
    }

    pub fn chat_id(&self) -> ChatId {
        self.group.chat_id
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub fn credentials(&self) -> &ProviderCredentials {
        &self.credentials
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns false when the integration was already active.
    pub fn activate(&mut self, now: Timestamp) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.updated_at = now;
        true
    }

    /// Returns false when the integration was already inactive.
    pub fn deactivate(&mut self, now: Timestamp) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.updated_at = now;
        true
    }

    /// Replaces the API key, returning the new one.
    pub fn rotate_api_key(&mut self, now: Timestamp) -> &ApiKey {
        self.api_key = ApiKey::generate();
        self.updated_at = now;
        &self.api_key
    }

    pub fn set_policy(&mut self, policy: AccessPolicy, now: Timestamp) {
        self.policy = policy;
        self.updated_at = now;
    }
}
