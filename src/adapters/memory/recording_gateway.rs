//! Recording messaging gateway for tests.
//!
//! Every call is recorded in order. Chats and member rights are seeded by the
//! test; individual operations can be told to fail.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::domain::foundation::{ChatId, ChatUserId};
use crate::domain::groups::{ChatInfo, MemberPermissions};
use crate::ports::{GatewayError, MessagingGateway};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    DirectMessage { user_id: ChatUserId, text: String },
    Invite { chat_id: ChatId, ttl_secs: i64 },
    Remove { chat_id: ChatId, user_id: ChatUserId },
    LeaveChat { chat_id: ChatId },
}

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailingOp {
    DirectMessage,
    Invite,
    Remove,
    FetchChat,
    FetchMembership,
    LeaveChat,
}

#[derive(Debug)]
pub struct RecordingGateway {
    bot_id: ChatUserId,
    calls: RwLock<Vec<GatewayCall>>,
    chats: RwLock<HashMap<ChatId, ChatInfo>>,
    permissions: RwLock<HashMap<(ChatId, ChatUserId), MemberPermissions>>,
    failing: RwLock<HashSet<FailingOp>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new(ChatUserId::new(777))
    }
}

impl RecordingGateway {
    pub fn new(bot_id: ChatUserId) -> Self {
        Self {
            bot_id,
            calls: RwLock::new(Vec::new()),
            chats: RwLock::new(HashMap::new()),
            permissions: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    pub fn bot_id(&self) -> ChatUserId {
        self.bot_id
    }

    /// Seed a chat with the bot holding `permissions` in it.
    pub async fn add_chat(&self, chat: ChatInfo, permissions: MemberPermissions) {
        self.permissions
            .write()
            .await
            .insert((chat.chat_id, self.bot_id), permissions);
        self.chats.write().await.insert(chat.chat_id, chat);
    }

    pub async fn fail(&self, op: FailingOp) {
        self.failing.write().await.insert(op);
    }

    pub async fn recover(&self, op: FailingOp) {
        self.failing.write().await.remove(&op);
    }

    // === Test Helpers ===

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.calls.read().await.clone()
    }

    pub async fn messages_to(&self, user_id: ChatUserId) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                GatewayCall::DirectMessage { user_id: to, text } if *to == user_id => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub async fn removals(&self) -> Vec<(ChatId, ChatUserId)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Remove { chat_id, user_id } => Some((*chat_id, *user_id)),
                _ => None,
            })
            .collect()
    }

    async fn check(&self, op: FailingOp) -> Result<(), GatewayError> {
        if self.failing.read().await.contains(&op) {
            return Err(GatewayError::Transport(format!("{:?} failed", op)));
        }
        Ok(())
    }

    async fn record(&self, call: GatewayCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_direct_message(
        &self,
        user_id: ChatUserId,
        text: &str,
    ) -> Result<(), GatewayError> {
        self.check(FailingOp::DirectMessage).await?;
        self.record(GatewayCall::DirectMessage {
            user_id,
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn create_single_use_invite(
        &self,
        chat_id: ChatId,
        ttl_secs: i64,
    ) -> Result<String, GatewayError> {
        self.check(FailingOp::Invite).await?;
        let count = self.calls.read().await.len();
        self.record(GatewayCall::Invite { chat_id, ttl_secs }).await;
        Ok(format!("https://t.me/+invite{}_{}", chat_id.value().unsigned_abs(), count))
    }

    async fn remove_member(
        &self,
        chat_id: ChatId,
        user_id: ChatUserId,
    ) -> Result<(), GatewayError> {
        self.check(FailingOp::Remove).await?;
        self.record(GatewayCall::Remove { chat_id, user_id }).await;
        Ok(())
    }

    async fn fetch_chat(&self, chat_id: ChatId) -> Result<ChatInfo, GatewayError> {
        self.check(FailingOp::FetchChat).await?;
        self.chats
            .read()
            .await
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("chat {}", chat_id)))
    }

    async fn fetch_membership(
        &self,
        chat_id: ChatId,
        user_id: ChatUserId,
    ) -> Result<MemberPermissions, GatewayError> {
        self.check(FailingOp::FetchMembership).await?;
        Ok(self
            .permissions
            .read()
            .await
            .get(&(chat_id, user_id))
            .copied()
            .unwrap_or_default())
    }

    async fn bot_user_id(&self) -> Result<ChatUserId, GatewayError> {
        Ok(self.bot_id)
    }

    async fn leave_chat(&self, chat_id: ChatId) -> Result<(), GatewayError> {
        self.check(FailingOp::LeaveChat).await?;
        self.record(GatewayCall::LeaveChat { chat_id }).await;
        Ok(())
    }
}
