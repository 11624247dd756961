//! Membership-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | InvalidState | 409 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind, MembershipId};

use super::MembershipStatus;

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Membership record was not found.
    NotFound(MembershipId),

    /// Operation not valid from the record's current status.
    InvalidState {
        current: MembershipStatus,
        attempted: &'static str,
    },

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Storage or transport failure.
    Infrastructure(String),
}

impl MembershipError {
    pub fn not_found(id: MembershipId) -> Self {
        MembershipError::NotFound(id)
    }

    pub fn invalid_state(current: MembershipStatus, attempted: &'static str) -> Self {
        MembershipError::InvalidState { current, attempted }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::NotFound(_) => ErrorCode::MemberNotFound,
            MembershipError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            MembershipError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::NotFound(id) => format!("Membership not found: {}", id),
            MembershipError::InvalidState { current, attempted } => {
                format!("Cannot {} membership in {} state", attempted, current)
            }
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            MembershipError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if a later pass may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MembershipError::Infrastructure(_))
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MembershipError {}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFormat => {
                MembershipError::ValidationFailed {
                    field: err.details.get("field").cloned().unwrap_or_default(),
                    message: err.message,
                }
            }
            _ => MembershipError::Infrastructure(err.to_string()),
        }
    }
}

impl From<MembershipError> for DomainError {
    fn from(err: MembershipError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
