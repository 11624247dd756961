//! Request and response bodies for the handshake routes.
//!
//! Temporary credentials are accepted on initiate and never echoed back.

use serde::{Deserialize, Serialize};

use crate::domain::authorization::{AuthorizationSession, SelectedGroup, SessionStatus};
use crate::domain::campaign::Tier;
use crate::domain::groups::{DiscoveredGroup, GroupKind};
use crate::domain::integration::{AccessPolicy, Integration};

#[derive(Debug, Clone, Deserialize)]
pub struct InitiateRequest {
    pub campaign_slug: String,
    pub api_key: String,
    pub bearer_token: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectGroupRequest {
    pub chat_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectTierRequest {
    /// `null` admits every paying supporter.
    #[serde(default)]
    pub tier_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityView {
    pub user_id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub status: SessionStatus,
    pub campaign_slug: String,
    pub redirect_uri: String,
    pub identity: Option<IdentityView>,
    pub group: Option<SelectedGroup>,
    pub tier: Option<Tier>,
    pub error_message: Option<String>,
    pub integration_id: Option<String>,
    /// ISO 8601
    pub expires_at: String,
}

impl From<&AuthorizationSession> for SessionResponse {
    fn from(session: &AuthorizationSession) -> Self {
        Self {
            token: session.token().as_str().to_string(),
            status: session.status(),
            campaign_slug: session.campaign_slug().to_string(),
            redirect_uri: session.redirect_uri().to_string(),
            identity: session.identity().map(|identity| IdentityView {
                user_id: identity.user_id.value(),
                first_name: identity.first_name.clone(),
                username: identity.username.clone(),
            }),
            group: session.group().cloned(),
            tier: session.tier().cloned(),
            error_message: session.error_message().map(str::to_string),
            integration_id: session.integration_id().map(|id| id.to_string()),
            expires_at: session.expires_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    pub id: String,
    pub campaign_slug: String,
    pub chat_id: i64,
    pub group_title: String,
    pub policy: AccessPolicy,
    pub is_active: bool,
}

impl From<&Integration> for IntegrationSummary {
    fn from(integration: &Integration) -> Self {
        Self {
            id: integration.id().to_string(),
            campaign_slug: integration.campaign_slug().to_string(),
            chat_id: integration.chat_id().value(),
            group_title: integration.group().title.clone(),
            policy: integration.policy().clone(),
            is_active: integration.is_active(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteResponse {
    pub session: SessionResponse,
    pub integration: IntegrationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibleGroupResponse {
    pub chat_id: i64,
    pub title: String,
    pub kind: GroupKind,
}

impl From<DiscoveredGroup> for EligibleGroupResponse {
    fn from(group: DiscoveredGroup) -> Self {
        Self {
            chat_id: group.chat_id.value(),
            title: group.title,
            kind: group.kind,
        }
    }
}
