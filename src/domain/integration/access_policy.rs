//! Access policy of an integration.
//!
//! The canonical form is a minimum tier threshold (or no threshold at all).
//! An explicit allow-list of tiers is accepted as input and normalised to the
//! cheapest tier it names, and the allow-list view is always derived from the
//! threshold against the campaign's catalog.

use serde::{Deserialize, Serialize};

use crate::domain::campaign::{Tier, TierCatalog};
use crate::domain::foundation::ValidationError;

/// Who may enter the destination group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Every supporter with a current payment is admitted.
    Open,
    /// Supporters whose tier costs at least `amount_cents` are admitted.
    MinimumTier { tier_id: String, amount_cents: i64 },
}

impl AccessPolicy {
    pub fn minimum(tier: &Tier) -> Self {
        AccessPolicy::MinimumTier {
            tier_id: tier.id.clone(),
            amount_cents: tier.amount_cents,
        }
    }

    /// Normalises an explicit allow-list into a threshold on its cheapest tier.
    ///
    /// An empty list means no restriction. Unknown tier ids are rejected.
    pub fn from_allow_list(
        tier_ids: &[String],
        catalog: &TierCatalog,
    ) -> Result<Self, ValidationError> {
        let mut cheapest: Option<&Tier> = None;
        for id in tier_ids {
            let tier = catalog.find(id).ok_or_else(|| {
                ValidationError::invalid_format("tier_ids", format!("unknown tier '{}'", id))
            })?;
            if cheapest.map_or(true, |c| tier.amount_cents < c.amount_cents) {
                cheapest = Some(tier);
            }
        }
        Ok(cheapest.map_or(AccessPolicy::Open, AccessPolicy::minimum))
    }

    pub fn tier_id(&self) -> Option<&str> {
        match self {
            AccessPolicy::Open => None,
            AccessPolicy::MinimumTier { tier_id, .. } => Some(tier_id),
        }
    }

    pub fn minimum_amount_cents(&self) -> Option<i64> {
        match self {
            AccessPolicy::Open => None,
            AccessPolicy::MinimumTier { amount_cents, .. } => Some(*amount_cents),
        }
    }

    /// Whether a supporter resolved to `tier` satisfies the threshold.
    ///
    /// A supporter with no matching tier only passes an open policy.
    pub fn admits(&self, tier: Option<&Tier>) -> bool {
        match (self, tier) {
            (AccessPolicy::Open, _) => true,
            (AccessPolicy::MinimumTier { .. }, None) => false,
            (AccessPolicy::MinimumTier { amount_cents, .. }, Some(tier)) => {
                tier.amount_cents >= *amount_cents
            }
        }
    }

    /// Derived allow-list: every catalog tier admitted by this policy.
    pub fn allow_list(&self, catalog: &TierCatalog) -> Vec<String> {
        let minimum = self.minimum_amount_cents().unwrap_or(i64::MIN);
        catalog.at_or_above(minimum).map(|t| t.id.clone()).collect()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(id: &str, amount: i64) -> Tier {
        Tier {
            id: id.to_string(),
            title: id.to_string(),
            amount_cents: amount,
        }
    }

    fn catalog() -> TierCatalog {
        TierCatalog::new(vec![tier("bronze", 500), tier("silver", 2000), tier("gold", 5000)])
    }

    #[test]
    fn open_policy_admits_everyone() {
        assert!(AccessPolicy::Open.admits(None));
        assert!(AccessPolicy::Open.admits(Some(&tier("bronze", 500))));
    }

    #[test]
    fn minimum_admits_equal_and_pricier_tiers() {
        let policy = AccessPolicy::minimum(&tier("silver", 2000));
        assert!(policy.admits(Some(&tier("silver", 2000))));
        assert!(policy.admits(Some(&tier("gold", 5000))));
        assert!(!policy.admits(Some(&tier("bronze", 500))));
        assert!(!policy.admits(None));
    }

    #[test]
    fn allow_list_normalises_to_cheapest() {
        let ids = vec!["gold".to_string(), "silver".to_string()];
        let policy = AccessPolicy::from_allow_list(&ids, &catalog()).unwrap();
        assert_eq!(policy.tier_id(), Some("silver"));
        assert_eq!(policy.minimum_amount_cents(), Some(2000));
    }

    #[test]
    fn empty_allow_list_is_open() {
        assert_eq!(AccessPolicy::from_allow_list(&[], &catalog()).unwrap(), AccessPolicy::Open);
    }

    #[test]
    fn allow_list_rejects_unknown_tier() {
        let ids = vec!["platinum".to_string()];
        assert!(AccessPolicy::from_allow_list(&ids, &catalog()).is_err());
    }

    #[test]
    fn derived_allow_list_matches_threshold() {
        let policy = AccessPolicy::minimum(&tier("silver", 2000));
        assert_eq!(policy.allow_list(&catalog()), vec!["silver", "gold"]);
        assert_eq!(AccessPolicy::Open.allow_list(&catalog()).len(), 3);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(AccessPolicy::minimum(&tier("gold", 5000))).unwrap();
        assert_eq!(json["type"], "minimum_tier");
        assert_eq!(json["amount_cents"], 5000);
    }
}
