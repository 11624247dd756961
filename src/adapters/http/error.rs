//! API error type shared by every route.
//!
//! Each application error exposes an `ErrorCode`; the HTTP status follows
//! from the code's `ErrorKind`. Internal failures are logged and answered
//! with a generic message.

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::{AdminError, WebhookHandlingError};
use crate::domain::authorization::SessionError;
use crate::domain::foundation::{DomainError, ErrorCode, ErrorKind};

/// JSON error body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        status_for(self.code.kind())
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::External => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<WebhookHandlingError> for ApiError {
    fn from(err: WebhookHandlingError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::new(err.code, err.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = %self.code, error = %self.message, "Request failed");
            "Internal server error".to_string()
        } else {
            self.message
        };
        let body = ErrorResponse::new(self.code.to_string(), message);
        (status, Json(body)).into_response()
    }
}
