//! teloxide implementation of MessagingGateway.

use async_trait::async_trait;
use chrono::Utc;
use teloxide::payloads::{CreateChatInviteLinkSetters, UnbanChatMemberSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatId as TgChatId, ChatMemberKind, UserId};
use teloxide::{ApiError, RequestError};
use tokio::sync::OnceCell;

use crate::domain::foundation::{ChatId, ChatUserId};
use crate::domain::groups::{ChatInfo, MemberPermissions};
use crate::ports::{GatewayError, MessagingGateway};

use super::updates::group_kind;

pub struct TelegramGateway {
    bot: Bot,
    bot_id: OnceCell<ChatUserId>,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            bot_id: OnceCell::new(),
        }
    }
}

fn tg_chat(chat_id: ChatId) -> TgChatId {
    TgChatId(chat_id.value())
}

fn tg_user(user_id: ChatUserId) -> UserId {
    UserId(user_id.value() as u64)
}

fn map_error(err: RequestError) -> GatewayError {
    match err {
        RequestError::Api(api) => match api {
            ApiError::ChatNotFound | ApiError::UserNotFound => GatewayError::NotFound(api.to_string()),
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::CantInitiateConversation => GatewayError::Forbidden(api.to_string()),
            other => {
                let message = other.to_string();
                let lowered = message.to_lowercase();
                if lowered.contains("not enough rights") || lowered.contains("forbidden") {
                    GatewayError::Forbidden(message)
                } else if lowered.contains("not found") {
                    GatewayError::NotFound(message)
                } else {
                    GatewayError::Transport(message)
                }
            }
        },
        other => GatewayError::Transport(other.to_string()),
    }
}

/// Owners hold every right; administrators hold what they were granted.
fn member_permissions(kind: &ChatMemberKind) -> MemberPermissions {
    let can_invite_users = match kind {
        ChatMemberKind::Owner(_) => true,
        ChatMemberKind::Administrator(admin) => admin.can_invite_users,
        _ => false,
    };
    MemberPermissions {
        is_administrator: kind.is_owner() || kind.is_administrator(),
        can_invite_users,
        can_manage_chat: kind.can_manage_chat(),
        can_post_messages: kind.can_post_messages(),
        can_restrict_members: kind.can_restrict_members(),
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_direct_message(&self, user_id: ChatUserId, text: &str) -> Result<(), GatewayError> {
        self.bot
            .send_message(TgChatId(user_id.value()), text)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn create_single_use_invite(
        &self,
        chat_id: ChatId,
        ttl_secs: i64,
    ) -> Result<String, GatewayError> {
        let expires = Utc::now() + chrono::Duration::seconds(ttl_secs.max(1));
        let link = self
            .bot
            .create_chat_invite_link(tg_chat(chat_id))
            .member_limit(1)
            .expire_date(expires)
            .await
            .map_err(map_error)?;
        Ok(link.invite_link)
    }

    async fn remove_member(&self, chat_id: ChatId, user_id: ChatUserId) -> Result<(), GatewayError> {
        self.bot
            .ban_chat_member(tg_chat(chat_id), tg_user(user_id))
            .await
            .map_err(map_error)?;
        // Lift the ban right away so a later invite still works.
        self.bot
            .unban_chat_member(tg_chat(chat_id), tg_user(user_id))
            .only_if_banned(true)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn fetch_chat(&self, chat_id: ChatId) -> Result<ChatInfo, GatewayError> {
        let chat = self.bot.get_chat(tg_chat(chat_id)).await.map_err(map_error)?;
        Ok(ChatInfo {
            chat_id,
            title: chat.title().map(str::to_string),
            kind: group_kind(&chat),
        })
    }

    async fn fetch_membership(
        &self,
        chat_id: ChatId,
        user_id: ChatUserId,
    ) -> Result<MemberPermissions, GatewayError> {
        let member = self
            .bot
            .get_chat_member(tg_chat(chat_id), tg_user(user_id))
            .await
            .map_err(map_error)?;
        Ok(member_permissions(&member.kind))
    }

    async fn bot_user_id(&self) -> Result<ChatUserId, GatewayError> {
        self.bot_id
            .get_or_try_init(|| async {
                let me = self.bot.get_me().await.map_err(map_error)?;
                Ok(ChatUserId::new(me.user.id.0 as i64))
            })
            .await
            .copied()
    }

    async fn leave_chat(&self, chat_id: ChatId) -> Result<(), GatewayError> {
        self.bot.leave_chat(tg_chat(chat_id)).await.map_err(map_error)?;
        Ok(())
    }
}

impl std::fmt::Debug for TelegramGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramGateway")
            .field("bot_id", &self.bot_id.get())
            .finish_non_exhaustive()
    }
}
