//! MessagingGateway port - the chat transport as seen by the application.
//!
//! Constructed once at startup and shared as `Arc<dyn MessagingGateway>`.
//! Callers decide whether a failure matters: reconciliation and removal
//! journal it and move on, integration creation treats it as fatal.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{ChatId, ChatUserId, ErrorCode, ErrorKind};
use crate::domain::groups::{ChatInfo, MemberPermissions};

/// Errors reported by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Chat or user unknown to the transport.
    #[error("not found: {0}")]
    NotFound(String),

    /// The bot lacks the rights for the call (not admin, blocked by user...).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Network failure or unexpected transport response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::NotFound(_) => ErrorCode::GroupNotFound,
            GatewayError::Forbidden(_) => ErrorCode::Unauthorized,
            GatewayError::Transport(_) => ErrorCode::ExternalServiceError,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code().kind()
    }
}

/// Port for talking to the chat transport.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a private message to a user.
    async fn send_direct_message(&self, user_id: ChatUserId, text: &str)
        -> Result<(), GatewayError>;

    /// Create an invite link for `chat_id` usable by exactly one member,
    /// expiring `ttl_secs` from now. Returns the link URL.
    async fn create_single_use_invite(
        &self,
        chat_id: ChatId,
        ttl_secs: i64,
    ) -> Result<String, GatewayError>;

    /// Kick a member: ban immediately followed by unban, so the user can
    /// rejoin later through a fresh invite.
    async fn remove_member(&self, chat_id: ChatId, user_id: ChatUserId)
        -> Result<(), GatewayError>;

    async fn fetch_chat(&self, chat_id: ChatId) -> Result<ChatInfo, GatewayError>;

    /// Rights of `user_id` in `chat_id`.
    async fn fetch_membership(
        &self,
        chat_id: ChatId,
        user_id: ChatUserId,
    ) -> Result<MemberPermissions, GatewayError>;

    /// The bot's own user id.
    async fn bot_user_id(&self) -> Result<ChatUserId, GatewayError>;

    async fn leave_chat(&self, chat_id: ChatId) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messaging_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn MessagingGateway) {}
    }

    #[test]
    fn forbidden_is_an_authorization_error() {
        assert_eq!(
            GatewayError::Forbidden("not admin".into()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            GatewayError::Transport("timeout".into()).kind(),
            ErrorKind::External
        );
    }
}
