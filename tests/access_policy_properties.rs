//! Property tests for the access predicate.

use proptest::prelude::*;

use supporter_gate::domain::access::{evaluate, DenialReason, Entitlement};
use supporter_gate::domain::campaign::{Tier, TierCatalog};
use supporter_gate::domain::integration::AccessPolicy;

fn catalog_strategy() -> impl Strategy<Value = TierCatalog> {
    prop::collection::btree_set(1i64..10_000, 1..6).prop_map(|amounts| {
        TierCatalog::new(
            amounts
                .into_iter()
                .enumerate()
                .map(|(i, amount_cents)| Tier {
                    id: format!("tier-{}", i),
                    title: format!("Tier {}", i),
                    amount_cents,
                })
                .collect(),
        )
    })
}

fn paid(catalog: &TierCatalog, cents: i64) -> Entitlement {
    Entitlement {
        subscribed: true,
        payment_current: true,
        paid_value_cents: cents,
        tier: catalog.tier_for_amount(cents).cloned(),
    }
}

proptest! {
    /// Paying more never loses access.
    #[test]
    fn paying_more_never_revokes_access(
        catalog in catalog_strategy(),
        pick in any::<prop::sample::Index>(),
        low in 0i64..12_000,
        extra in 0i64..12_000,
    ) {
        let tier = pick.get(catalog.tiers()).clone();
        let policy = AccessPolicy::minimum(&tier);

        if evaluate(&paid(&catalog, low), &policy).is_ok() {
            prop_assert!(evaluate(&paid(&catalog, low + extra), &policy).is_ok());
        }
    }

    /// Anyone a stricter threshold admits, a looser one admits too.
    #[test]
    fn lower_threshold_admits_a_superset(
        catalog in catalog_strategy(),
        a in any::<prop::sample::Index>(),
        b in any::<prop::sample::Index>(),
        cents in 0i64..12_000,
    ) {
        let (x, y) = (a.get(catalog.tiers()), b.get(catalog.tiers()));
        let (loose, strict) = if x.amount_cents <= y.amount_cents { (x, y) } else { (y, x) };
        let entitlement = paid(&catalog, cents);

        if evaluate(&entitlement, &AccessPolicy::minimum(strict)).is_ok() {
            prop_assert!(evaluate(&entitlement, &AccessPolicy::minimum(loose)).is_ok());
        }
        prop_assert!(evaluate(&entitlement, &AccessPolicy::Open).is_ok());
    }

    /// Subscription and payment are checked before the tier.
    #[test]
    fn unpaid_supporters_are_refused_whatever_the_policy(
        catalog in catalog_strategy(),
        pick in any::<prop::sample::Index>(),
        cents in 0i64..12_000,
        subscribed in any::<bool>(),
    ) {
        let policy = AccessPolicy::minimum(pick.get(catalog.tiers()));
        let entitlement = Entitlement {
            subscribed,
            payment_current: false,
            ..paid(&catalog, cents)
        };

        let expected = if subscribed {
            DenialReason::PaymentPending
        } else {
            DenialReason::NotSubscriber
        };
        prop_assert_eq!(evaluate(&entitlement, &policy), Err(expected));
        prop_assert_eq!(evaluate(&entitlement, &AccessPolicy::Open), Err(expected));
    }

    /// An allow-list becomes its cheapest tier, and the derived allow-list
    /// covers every tier named.
    #[test]
    fn allow_list_round_trips_through_the_threshold(
        catalog in catalog_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..4),
    ) {
        let ids: Vec<String> = picks
            .iter()
            .map(|p| p.get(catalog.tiers()).id.clone())
            .collect();

        let policy = AccessPolicy::from_allow_list(&ids, &catalog).unwrap();
        let derived = policy.allow_list(&catalog);

        for id in &ids {
            prop_assert!(derived.contains(id));
        }
        let cheapest = ids
            .iter()
            .filter_map(|id| catalog.find(id))
            .map(|t| t.amount_cents)
            .min();
        prop_assert_eq!(policy.minimum_amount_cents(), cheapest);
    }
}
