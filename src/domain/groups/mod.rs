//! Groups module - chats the bot has been added to.
//!
//! A `DiscoveredGroup` is the last-known view of a chat and of the bot's
//! rights inside it. Only groups where the bot can both invite users and
//! manage the chat are offered as handshake destinations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{ChatId, Timestamp, ValidationError};

/// Kind of destination chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Group,
    Supergroup,
    Channel,
    Private,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Group => "group",
            GroupKind::Supergroup => "supergroup",
            GroupKind::Channel => "channel",
            GroupKind::Private => "private",
        }
    }

    /// Private chats can never be a destination.
    pub fn is_destination(&self) -> bool {
        !matches!(self, GroupKind::Private)
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(GroupKind::Group),
            "supergroup" => Ok(GroupKind::Supergroup),
            "channel" => Ok(GroupKind::Channel),
            "private" => Ok(GroupKind::Private),
            other => Err(ValidationError::invalid_format(
                "group_kind",
                format!("unknown chat kind '{}'", other),
            )),
        }
    }
}

/// Rights of a chat member, as reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPermissions {
    pub is_administrator: bool,
    pub can_invite_users: bool,
    pub can_manage_chat: bool,
    pub can_post_messages: bool,
    pub can_restrict_members: bool,
}

impl MemberPermissions {
    /// Rights required to gate a group: invite supporters and manage the chat.
    pub fn can_gate(&self) -> bool {
        self.is_administrator && self.can_invite_users && self.can_manage_chat
    }
}

/// Chat metadata as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    pub chat_id: ChatId,
    pub title: Option<String>,
    pub kind: GroupKind,
}

/// Persisted record of a group the bot knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredGroup {
    pub chat_id: ChatId,
    pub title: String,
    pub kind: GroupKind,
    pub permissions: MemberPermissions,
    pub refreshed_at: Timestamp,
}

impl DiscoveredGroup {
    pub fn from_observation(chat: ChatInfo, permissions: MemberPermissions, now: Timestamp) -> Self {
        let title = chat
            .title
            .unwrap_or_else(|| format!("Chat {}", chat.chat_id));
        Self {
            chat_id: chat.chat_id,
            title,
            kind: chat.kind,
            permissions,
            refreshed_at: now,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.kind.is_destination()
            && self.permissions.can_invite_users
            && self.permissions.can_manage_chat
    }
}
