//! CampaignCatalog port - read access to the marketplace's campaigns.

use async_trait::async_trait;

use crate::domain::campaign::{Campaign, TierCatalog};
use crate::domain::foundation::DomainError;

/// Read-only view of campaigns and their reward tiers.
#[async_trait]
pub trait CampaignCatalog: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Campaign>, DomainError>;

    async fn find_by_id(&self, campaign_id: &str) -> Result<Option<Campaign>, DomainError>;

    /// Tiers of a campaign, cheapest first. Unknown campaigns have no tiers.
    async fn tiers(&self, campaign_id: &str) -> Result<TierCatalog, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn CampaignCatalog) {}
    }
}
