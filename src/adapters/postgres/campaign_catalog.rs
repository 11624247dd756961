//! PostgreSQL implementation of CampaignCatalog.
//!
//! Reads the marketplace's `campaigns` and `campaign_reward_levels` tables.
//! Nothing here writes to them.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::campaign::{Campaign, Tier, TierCatalog};
use crate::domain::foundation::DomainError;
use crate::ports::CampaignCatalog;

pub struct PostgresCampaignCatalog {
    pool: PgPool,
}

impl PostgresCampaignCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    id: String,
    slug: String,
    title: String,
    owner_id: String,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            slug: row.slug,
            title: row.title,
            owner_id: row.owner_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: String,
    title: String,
    amount_cents: i64,
}

#[async_trait]
impl CampaignCatalog for PostgresCampaignCatalog {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Campaign>, DomainError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            "SELECT id, slug, title, owner_id FROM campaigns WHERE slug = $1",
        )
        .bind(slug.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch campaign: {}", e)))?;

        Ok(row.map(Campaign::from))
    }

    async fn find_by_id(&self, campaign_id: &str) -> Result<Option<Campaign>, DomainError> {
        let row = sqlx::query_as::<_, CampaignRow>(
            "SELECT id, slug, title, owner_id FROM campaigns WHERE id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch campaign: {}", e)))?;

        Ok(row.map(Campaign::from))
    }

    async fn tiers(&self, campaign_id: &str) -> Result<TierCatalog, DomainError> {
        let rows = sqlx::query_as::<_, TierRow>(
            r#"
            SELECT id, title, amount_cents
            FROM campaign_reward_levels
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch tiers: {}", e)))?;

        Ok(TierCatalog::new(
            rows.into_iter()
                .map(|row| Tier {
                    id: row.id,
                    title: row.title,
                    amount_cents: row.amount_cents,
                })
                .collect(),
        ))
    }
}
