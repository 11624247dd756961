//! Campaign module - read model of the crowdfunding campaign.
//!
//! Campaigns and their reward tiers are owned by the marketplace. This crate
//! only reads them: to resolve a slug during the handshake, to check who owns
//! a campaign, and to translate a paid amount into a tier.

use serde::{Deserialize, Serialize};

/// Campaign as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub slug: String,
    pub title: String,
    /// Maker who owns the campaign.
    pub owner_id: String,
}

impl Campaign {
    pub fn is_owned_by(&self, maker_id: &str) -> bool {
        self.owner_id == maker_id
    }
}

/// A named pledge-amount bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub title: String,
    pub amount_cents: i64,
}

/// The tiers of one campaign, kept ordered by amount (cheapest first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierCatalog {
    tiers: Vec<Tier>,
}

impl TierCatalog {
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by(|a, b| a.amount_cents.cmp(&b.amount_cents).then_with(|| a.id.cmp(&b.id)));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn find(&self, tier_id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.id == tier_id)
    }

    /// Highest tier whose amount is covered by `paid_cents`.
    pub fn tier_for_amount(&self, paid_cents: i64) -> Option<&Tier> {
        self.tiers.iter().rev().find(|t| t.amount_cents <= paid_cents)
    }

    /// Every tier priced at or above `minimum_cents`.
    pub fn at_or_above(&self, minimum_cents: i64) -> impl Iterator<Item = &Tier> {
        self.tiers.iter().filter(move |t| t.amount_cents >= minimum_cents)
    }
}
