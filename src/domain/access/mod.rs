//! Access module - entitlement evaluation.
//!
//! [`evaluate`] is the one predicate deciding whether a supporter may be in a
//! group. Live verification and scheduled reconciliation both call it, so an
//! entitlement that admits someone on Monday cannot be judged differently by
//! Tuesday's sync.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::campaign::Tier;
use crate::domain::foundation::{ChatId, IntegrationId, Timestamp};
use crate::domain::integration::AccessPolicy;
use crate::domain::membership::Email;

/// Computed {subscribed, payment-current, tier} triple for one supporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    pub subscribed: bool,
    pub payment_current: bool,
    pub paid_value_cents: i64,
    pub tier: Option<Tier>,
}

impl Entitlement {
    /// The provider has never heard of this supporter.
    pub fn not_subscribed() -> Self {
        Self {
            subscribed: false,
            payment_current: false,
            paid_value_cents: 0,
            tier: None,
        }
    }
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NotSubscriber,
    PaymentPending,
    TierTooLow,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NotSubscriber => "not a subscriber",
            DenialReason::PaymentPending => "payment pending",
            DenialReason::TierTooLow => "tier too low",
        }
    }

    /// Sentence sent to the supporter in chat.
    pub fn user_message(&self) -> &'static str {
        match self {
            DenialReason::NotSubscriber => {
                "We could not find an active support for this e-mail address."
            }
            DenialReason::PaymentPending => {
                "Your support was found, but this month's payment has not been confirmed yet."
            }
            DenialReason::TierTooLow => {
                "Your current support level does not include access to this group."
            }
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pure access predicate.
pub fn evaluate(entitlement: &Entitlement, policy: &AccessPolicy) -> Result<(), DenialReason> {
    if !entitlement.subscribed {
        return Err(DenialReason::NotSubscriber);
    }
    if !entitlement.payment_current {
        return Err(DenialReason::PaymentPending);
    }
    if !policy.admits(entitlement.tier.as_ref()) {
        return Err(DenialReason::TierTooLow);
    }
    Ok(())
}

/// Proof that a supporter passed [`evaluate`] for an active integration.
///
/// Only the access verifier can mint one, so issuing an invite without a
/// passed check does not type-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    integration_id: IntegrationId,
    chat_id: ChatId,
    email: Email,
    entitlement: Entitlement,
    granted_at: Timestamp,
}

impl AccessGrant {
    pub(crate) fn new(
        integration_id: IntegrationId,
        chat_id: ChatId,
        email: Email,
        entitlement: Entitlement,
        granted_at: Timestamp,
    ) -> Self {
        Self {
            integration_id,
            chat_id,
            email,
            entitlement,
            granted_at,
        }
    }

    pub fn integration_id(&self) -> IntegrationId {
        self.integration_id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn entitlement(&self) -> &Entitlement {
        &self.entitlement
    }

    pub fn granted_at(&self) -> Timestamp {
        self.granted_at
    }
}

/// Result of checking one supporter against one integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(AccessGrant),
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }

    pub fn denial(&self) -> Option<DenialReason> {
        match self {
            AccessDecision::Granted(_) => None,
            AccessDecision::Denied(reason) => Some(*reason),
        }
    }

    pub fn into_grant(self) -> Option<AccessGrant> {
        match self {
            AccessDecision::Granted(grant) => Some(grant),
            AccessDecision::Denied(_) => None,
        }
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

    fn paying(tier: Option<Tier>) -> Entitlement {
        Entitlement {
            subscribed: true,
            payment_current: true,
            paid_value_cents: tier.as_ref().map_or(0, |t| t.amount_cents),
            tier,
        }
    }

    #[test]
    fn not_subscribed_is_denied_first() {
        let policy = AccessPolicy::minimum(&tier("gold", 5000));
        assert_eq!(
            evaluate(&Entitlement::not_subscribed(), &policy),
            Err(DenialReason::NotSubscriber)
        );
    }

    #[test]
    fn unpaid_is_payment_pending() {
        let entitlement = Entitlement {
            payment_current: false,
            ..paying(Some(tier("gold", 5000)))
        };
        assert_eq!(
            evaluate(&entitlement, &AccessPolicy::Open),
            Err(DenialReason::PaymentPending)
        );
    }

    #[test]
    fn tier_below_minimum_is_too_low() {
        let policy = AccessPolicy::minimum(&tier("silver", 2000));
        assert_eq!(
            evaluate(&paying(Some(tier("bronze", 500))), &policy),
            Err(DenialReason::TierTooLow)
        );
        assert_eq!(evaluate(&paying(None), &policy), Err(DenialReason::TierTooLow));
    }

    #[test]
    fn tier_at_or_above_minimum_is_granted() {
        let policy = AccessPolicy::minimum(&tier("silver", 2000));
        assert_eq!(evaluate(&paying(Some(tier("silver", 2000))), &policy), Ok(()));
        assert_eq!(evaluate(&paying(Some(tier("gold", 5000))), &policy), Ok(()));
    }

    #[test]
    fn open_policy_ignores_tier() {
        assert_eq!(evaluate(&paying(None), &AccessPolicy::Open), Ok(()));
    }

    #[test]
    fn denial_reasons_render_canonical_text() {
        assert_eq!(DenialReason::NotSubscriber.to_string(), "not a subscriber");
        assert_eq!(DenialReason::PaymentPending.to_string(), "payment pending");
        assert_eq!(DenialReason::TierTooLow.to_string(), "tier too low");
    }
}
