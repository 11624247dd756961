use serde::{Deserialize, Serialize};

use crate::domain::integration::{AccessPolicy, Integration};

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePolicyRequest {
    /// `null` opens the group to every paying supporter.
    #[serde(default)]
    pub tier_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationResponse {
    pub id: String,
    pub campaign_id: String,
    pub campaign_slug: String,
    pub chat_id: i64,
    pub group_title: String,
    pub policy: AccessPolicy,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Integration> for IntegrationResponse {
    fn from(integration: &Integration) -> Self {
        Self {
            id: integration.id().to_string(),
            campaign_id: integration.campaign_id().to_string(),
            campaign_slug: integration.campaign_slug().to_string(),
            chat_id: integration.chat_id().value(),
            group_title: integration.group().title.clone(),
            policy: integration.policy().clone(),
            is_active: integration.is_active(),
            created_at: integration.created_at().as_datetime().to_rfc3339(),
            updated_at: integration.updated_at().as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RotateKeyResponse {
    pub api_key: String,
}
