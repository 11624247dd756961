//! In-memory campaign catalog seeded by the caller.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::campaign::{Campaign, Tier, TierCatalog};
use crate::domain::foundation::DomainError;
use crate::ports::CampaignCatalog;

#[derive(Debug, Default)]
pub struct InMemoryCampaignCatalog {
    campaigns: RwLock<HashMap<String, (Campaign, Vec<Tier>)>>,
}

impl InMemoryCampaignCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, campaign: Campaign, tiers: Vec<Tier>) {
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), (campaign, tiers));
    }
}

#[async_trait]
impl CampaignCatalog for InMemoryCampaignCatalog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Campaign>, DomainError> {
        Ok(self
            .campaigns
            .read()
            .await
            .values()
            .find(|(c, _)| c.slug == slug)
            .map(|(c, _)| c.clone()))
    }

    async fn find_by_id(&self, campaign_id: &str) -> Result<Option<Campaign>, DomainError> {
        Ok(self
            .campaigns
            .read()
            .await
            .get(campaign_id)
            .map(|(c, _)| c.clone()))
    }

    async fn tiers(&self, campaign_id: &str) -> Result<TierCatalog, DomainError> {
        let tiers = self
            .campaigns
            .read()
            .await
            .get(campaign_id)
            .map(|(_, tiers)| tiers.clone())
            .unwrap_or_default();
        Ok(TierCatalog::new(tiers))
    }
}
