//! Membership status state machine.
//!
//! pending_verification → active → payment_overdue ⟷ active, and any state
//! may be removed. A removed record re-enters through pending_verification.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standing of a supporter within one integration's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Invite issued, chat identity not linked yet.
    PendingVerification,

    /// Linked and paying.
    Active,

    /// Linked but the last check found no current payment.
    /// Still in the group until the grace window runs out.
    PaymentOverdue,

    /// Out of the group. Reused if the supporter comes back.
    Removed,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::PendingVerification => "pending_verification",
            MembershipStatus::Active => "active",
            MembershipStatus::PaymentOverdue => "payment_overdue",
            MembershipStatus::Removed => "removed",
        }
    }

    /// Statuses the reconciliation pass re-verifies.
    pub fn is_reconciled(&self) -> bool {
        matches!(self, MembershipStatus::Active | MembershipStatus::PaymentOverdue)
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_verification" => Ok(MembershipStatus::PendingVerification),
            "active" => Ok(MembershipStatus::Active),
            "payment_overdue" => Ok(MembershipStatus::PaymentOverdue),
            "removed" => Ok(MembershipStatus::Removed),
            other => Err(ValidationError::invalid_format(
                "membership_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

impl StateMachine for MembershipStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use MembershipStatus::*;
        matches!(
            (self, target),
            // From PENDING_VERIFICATION
            (PendingVerification, Active)
                | (PendingVerification, Removed)
            // From ACTIVE
                | (Active, PaymentOverdue)
                | (Active, Removed)
            // From PAYMENT_OVERDUE
                | (PaymentOverdue, Active)
                | (PaymentOverdue, Removed)
            // From REMOVED
                | (Removed, PendingVerification)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use MembershipStatus::*;
        match self {
            PendingVerification => vec![Active, Removed],
            Active => vec![PaymentOverdue, Removed],
            PaymentOverdue => vec![Active, Removed],
            Removed => vec![PendingVerification],
        }
    }
}
