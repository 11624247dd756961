//! Membership lifecycle windows

use serde::Deserialize;

use super::error::ValidationError;

/// Every field has a default, so the whole section is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipConfig {
    #[serde(default = "default_invite_ttl_hours")]
    pub invite_ttl_hours: i64,

    /// Days an overdue member keeps access before automatic removal.
    #[serde(default = "default_removal_tolerance_days")]
    pub removal_tolerance_days: i64,

    /// Window quoted in the grace notice.
    #[serde(default = "default_warning_grace_hours")]
    pub warning_grace_hours: i64,

    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,

    /// Expired sessions are kept this long before the purge job drops them.
    #[serde(default = "default_session_retention_hours")]
    pub session_retention_hours: i64,

    /// Oldest accepted login-widget `auth_date`.
    #[serde(default = "default_proof_max_age_secs")]
    pub proof_max_age_secs: i64,
}

impl MembershipConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let windows = [
            ("membership.invite_ttl_hours", self.invite_ttl_hours),
            ("membership.removal_tolerance_days", self.removal_tolerance_days),
            ("membership.warning_grace_hours", self.warning_grace_hours),
            ("membership.session_ttl_minutes", self.session_ttl_minutes),
            ("membership.session_retention_hours", self.session_retention_hours),
            ("membership.proof_max_age_secs", self.proof_max_age_secs),
        ];
        match windows.into_iter().find(|(_, value)| *value <= 0) {
            Some((name, _)) => Err(ValidationError::InvalidWindow(name)),
            None => Ok(()),
        }
    }
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            invite_ttl_hours: default_invite_ttl_hours(),
            removal_tolerance_days: default_removal_tolerance_days(),
            warning_grace_hours: default_warning_grace_hours(),
            session_ttl_minutes: default_session_ttl_minutes(),
            session_retention_hours: default_session_retention_hours(),
            proof_max_age_secs: default_proof_max_age_secs(),
        }
    }
}

fn default_invite_ttl_hours() -> i64 {
    24
}

fn default_removal_tolerance_days() -> i64 {
    7
}

fn default_warning_grace_hours() -> i64 {
    48
}

fn default_session_ttl_minutes() -> i64 {
    30
}

fn default_session_retention_hours() -> i64 {
    24
}

fn default_proof_max_age_secs() -> i64 {
    300
}
