//! Handshake error types.

use thiserror::Error;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, ErrorKind};

use super::{ProofError, SessionStatus};

/// Errors raised while driving an authorization session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Authorization session not found")]
    NotFound,

    /// Expired or already in a terminal status. The flow must restart.
    #[error("Authorization session is no longer valid ({status})")]
    Invalid { status: SessionStatus },

    #[error("Operation requires a {expected} session, found {actual}")]
    WrongStatus {
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("Temporary credentials are invalid or expired")]
    InvalidCredentials,

    #[error("Campaign '{0}' not found")]
    CampaignNotFound(String),

    #[error("Identity proof rejected: {0}")]
    ProofRejected(#[from] ProofError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Group {0} is already bound to an integration")]
    GroupAlreadyBound(ChatId),

    #[error("External service failed: {0}")]
    External(String),

    #[error("Internal error: {0}")]
    Infrastructure(String),
}

impl SessionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::NotFound => ErrorCode::SessionNotFound,
            SessionError::Invalid { .. } => ErrorCode::SessionInvalid,
            SessionError::WrongStatus { .. } => ErrorCode::InvalidStateTransition,
            SessionError::InvalidCredentials => ErrorCode::InvalidCredentials,
            SessionError::CampaignNotFound(_) => ErrorCode::CampaignNotFound,
            SessionError::ProofRejected(_) => ErrorCode::InvalidSignature,
            SessionError::Validation(_) => ErrorCode::ValidationFailed,
            SessionError::Unauthorized(_) => ErrorCode::Unauthorized,
            SessionError::GroupAlreadyBound(_) => ErrorCode::GroupAlreadyBound,
            SessionError::External(_) => ErrorCode::ExternalServiceError,
            SessionError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

impl From<DomainError> for SessionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFormat => {
                SessionError::Validation(err.message)
            }
            ErrorCode::SessionNotFound => SessionError::NotFound,
            ErrorCode::Unauthorized => SessionError::Unauthorized(err.message),
            ErrorCode::ExternalServiceError | ErrorCode::RateLimited => {
                SessionError::External(err.message)
            }
            _ => SessionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<SessionError> for DomainError {
    fn from(err: SessionError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}
