//! Journal module - append-only audit entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::foundation::{IntegrationId, MembershipId, Timestamp, ValidationError};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventType {
    MemberJoined,
    MemberVerified,
    MemberRemoved,
    PaymentOverdue,
    PaymentRecovered,
    WarningSent,
    InviteIssued,
    IntegrationCreated,
    IntegrationUpdated,
    IntegrationDeleted,
    Error,
}

impl JournalEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalEventType::MemberJoined => "member_joined",
            JournalEventType::MemberVerified => "member_verified",
            JournalEventType::MemberRemoved => "member_removed",
            JournalEventType::PaymentOverdue => "payment_overdue",
            JournalEventType::PaymentRecovered => "payment_recovered",
            JournalEventType::WarningSent => "warning_sent",
            JournalEventType::InviteIssued => "invite_issued",
            JournalEventType::IntegrationCreated => "integration_created",
            JournalEventType::IntegrationUpdated => "integration_updated",
            JournalEventType::IntegrationDeleted => "integration_deleted",
            JournalEventType::Error => "error",
        }
    }
}

impl fmt::Display for JournalEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JournalEventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use JournalEventType::*;
        let parsed = match s {
            "member_joined" => MemberJoined,
            "member_verified" => MemberVerified,
            "member_removed" => MemberRemoved,
            "payment_overdue" => PaymentOverdue,
            "payment_recovered" => PaymentRecovered,
            "warning_sent" => WarningSent,
            "invite_issued" => InviteIssued,
            "integration_created" => IntegrationCreated,
            "integration_updated" => IntegrationUpdated,
            "integration_deleted" => IntegrationDeleted,
            "error" => Error,
            other => {
                return Err(ValidationError::invalid_format(
                    "event_type",
                    format!("unknown journal event '{}'", other),
                ))
            }
        };
        Ok(parsed)
    }
}

/// Immutable audit entry. Built with the `with_*` helpers, then appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub event_type: JournalEventType,
    pub integration_id: Option<IntegrationId>,
    pub membership_id: Option<MembershipId>,
    pub external_user_id: Option<String>,
    pub metadata: serde_json::Value,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

impl JournalEntry {
    pub fn new(event_type: JournalEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            integration_id: None,
            membership_id: None,
            external_user_id: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            error_message: None,
            created_at: Timestamp::now(),
        }
    }

    /// An `error` entry carrying the failure text.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(JournalEventType::Error).with_error(message)
    }

    pub fn with_integration(mut self, id: IntegrationId) -> Self {
        self.integration_id = Some(id);
        self
    }

    pub fn with_member(mut self, id: MembershipId) -> Self {
        self.membership_id = Some(id);
        self
    }

    pub fn with_external_user(mut self, id: impl ToString) -> Self {
        self.external_user_id = Some(id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }
}
