//! Error types for the domain layer.
//!
//! `DomainError` is the shared currency of the ports. Module-level error
//! enums convert into and out of it, and every error can be classified into
//! an [`ErrorKind`] so callers decide between retrying, surfacing to the
//! user, or paging an operator.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input. Terminal, never retried.
    Validation,
    /// Ownership or credential mismatch. Terminal.
    Authorization,
    /// Operation not valid for the current status. Caller restarts the flow.
    State,
    NotFound,
    /// Provider or transport unavailable. Retried on the next scheduled pass.
    External,
    /// Bad secrets or credentials. Surfaced to operators.
    Configuration,
    Internal,
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidFormat,

    // Not found errors
    SessionNotFound,
    IntegrationNotFound,
    MemberNotFound,
    CampaignNotFound,
    GroupNotFound,

    // State errors
    InvalidStateTransition,
    SessionInvalid,
    GroupAlreadyBound,
    IntegrationInactive,

    // Authorization errors
    Unauthorized,
    InvalidCredentials,
    InvalidSignature,

    // External errors
    ExternalServiceError,
    RateLimited,

    // Configuration errors
    ConfigurationError,

    // Infrastructure errors
    DatabaseError,
    CacheError,
    InternalError,
}

impl ErrorCode {
    /// Maps the code onto the crate-wide taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFormat => ErrorKind::Validation,
            ErrorCode::SessionNotFound
            | ErrorCode::IntegrationNotFound
            | ErrorCode::MemberNotFound
            | ErrorCode::CampaignNotFound
            | ErrorCode::GroupNotFound => ErrorKind::NotFound,
            ErrorCode::InvalidStateTransition
            | ErrorCode::SessionInvalid
            | ErrorCode::GroupAlreadyBound
            | ErrorCode::IntegrationInactive => ErrorKind::State,
            ErrorCode::Unauthorized | ErrorCode::InvalidCredentials | ErrorCode::InvalidSignature => {
                ErrorKind::Authorization
            }
            ErrorCode::ExternalServiceError | ErrorCode::RateLimited => ErrorKind::External,
            ErrorCode::ConfigurationError => ErrorKind::Configuration,
            ErrorCode::DatabaseError | ErrorCode::CacheError | ErrorCode::InternalError => {
                ErrorKind::Internal
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::IntegrationNotFound => "INTEGRATION_NOT_FOUND",
            ErrorCode::MemberNotFound => "MEMBER_NOT_FOUND",
            ErrorCode::CampaignNotFound => "CAMPAIGN_NOT_FOUND",
            ErrorCode::GroupNotFound => "GROUP_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::SessionInvalid => "SESSION_INVALID",
            ErrorCode::GroupAlreadyBound => "GROUP_ALREADY_BOUND",
            ErrorCode::IntegrationInactive => "INTEGRATION_INACTIVE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::CacheError => "CACHE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Creates a cache/queue backend error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        let field = match &err {
            ValidationError::EmptyField { field } => field.clone(),
            ValidationError::InvalidFormat { field, .. } => field.clone(),
        };
        DomainError::validation(field, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("email");
        assert_eq!(format!("{}", err), "Field 'email' cannot be empty");
    }

    #[test]
    fn validation_error_invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("email", "missing @ symbol");
        assert_eq!(
            format!("{}", err),
            "Field 'email' has invalid format: missing @ symbol"
        );
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::SessionNotFound, "Session not found");
        assert_eq!(format!("{}", err), "[SESSION_NOT_FOUND] Session not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::new(ErrorCode::GroupAlreadyBound, "Group taken")
            .with_detail("group_id", "-100123");

        assert_eq!(err.details.get("group_id"), Some(&"-100123".to_string()));
    }

    #[test]
    fn validation_error_converts_with_field_detail() {
        let err: DomainError = ValidationError::empty_field("slug").into();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.get("field"), Some(&"slug".to_string()));
    }

    #[test]
    fn codes_classify_into_taxonomy() {
        assert_eq!(ErrorCode::GroupAlreadyBound.kind(), ErrorKind::State);
        assert_eq!(ErrorCode::InvalidCredentials.kind(), ErrorKind::Authorization);
        assert_eq!(ErrorCode::RateLimited.kind(), ErrorKind::External);
        assert_eq!(ErrorCode::ConfigurationError.kind(), ErrorKind::Configuration);
        assert_eq!(ErrorCode::DatabaseError.kind(), ErrorKind::Internal);
    }
}
