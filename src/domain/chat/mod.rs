//! Chat module - transport-neutral inbound updates.
//!
//! Both long-polling and webhook push are converted into [`InboundUpdate`]
//! before any handling, so the bot logic matches exhaustively on one enum.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ChatId, ChatUserId};
use crate::domain::groups::GroupKind;

/// Sender or subject of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: ChatUserId,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

impl ChatUser {
    /// `@username` when available, else the first name.
    pub fn display_handle(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.first_name.clone(),
        }
    }
}

/// The chat an update happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub id: ChatId,
    pub kind: GroupKind,
    pub title: Option<String>,
}

impl ChatRef {
    pub fn is_private(&self) -> bool {
        self.kind == GroupKind::Private
    }
}

/// Slash commands understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotCommand {
    /// `/start` or `/start <invite token>` from a deep link.
    Start { payload: Option<String> },
    Help,
    Verify,
    /// Re-check the bot's rights in the current group.
    Register,
    Unknown(String),
}

impl BotCommand {
    /// Parses `/name[@bot] [payload]`. Returns `None` for plain text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, payload) = match rest.split_once(char::is_whitespace) {
            Some((head, payload)) => (head, Some(payload.trim()).filter(|p| !p.is_empty())),
            None => (rest, None),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let command = match name.as_str() {
            "start" => BotCommand::Start {
                payload: payload.map(str::to_string),
            },
            "help" => BotCommand::Help,
            "verify" => BotCommand::Verify,
            "register" => BotCommand::Register,
            _ => BotCommand::Unknown(name),
        };
        Some(command)
    }
}

/// The bot's own standing in a chat after a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotMembership {
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl BotMembership {
    pub fn is_present(&self) -> bool {
        matches!(
            self,
            BotMembership::Administrator | BotMembership::Member | BotMembership::Restricted
        )
    }
}

/// Every kind of update the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundUpdate {
    Command {
        chat: ChatRef,
        from: ChatUser,
        command: BotCommand,
    },
    Text {
        chat: ChatRef,
        from: ChatUser,
        text: String,
    },
    MembersJoined {
        chat: ChatRef,
        members: Vec<ChatUser>,
    },
    MemberLeft {
        chat: ChatRef,
        member: ChatUser,
    },
    BotMembershipChanged {
        chat: ChatRef,
        status: BotMembership,
    },
}

impl InboundUpdate {
    /// Builds a `Command` or `Text` update from a message body.
    pub fn from_message(chat: ChatRef, from: ChatUser, text: &str) -> Self {
        match BotCommand::parse(text) {
            Some(command) => InboundUpdate::Command { chat, from, command },
            None => InboundUpdate::Text {
                chat,
                from,
                text: text.to_string(),
            },
        }
    }

    pub fn chat(&self) -> &ChatRef {
        match self {
            InboundUpdate::Command { chat, .. }
            | InboundUpdate::Text { chat, .. }
            | InboundUpdate::MembersJoined { chat, .. }
            | InboundUpdate::MemberLeft { chat, .. }
            | InboundUpdate::BotMembershipChanged { chat, .. } => chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_chat() -> ChatRef {
        ChatRef {
            id: ChatId::new(5),
            kind: GroupKind::Private,
            title: None,
        }
    }

    fn user() -> ChatUser {
        ChatUser {
            id: ChatUserId::new(5),
            is_bot: false,
            first_name: "Ana".into(),
            username: None,
        }
    }

    #[test]
    fn parses_start_with_deep_link_payload() {
        assert_eq!(
            BotCommand::parse("/start abc123"),
            Some(BotCommand::Start { payload: Some("abc123".into()) })
        );
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start { payload: None }));
    }

    #[test]
    fn strips_bot_mention_and_case() {
        assert_eq!(BotCommand::parse("/Help@SupporterBot"), Some(BotCommand::Help));
        assert_eq!(BotCommand::parse("/register@SupporterBot"), Some(BotCommand::Register));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(BotCommand::parse("ana@example.com"), None);
    }

    #[test]
    fn unknown_commands_are_kept() {
        assert_eq!(BotCommand::parse("/dance now"), Some(BotCommand::Unknown("dance".into())));
    }

    #[test]
    fn from_message_splits_commands_from_text() {
        assert!(matches!(
            InboundUpdate::from_message(private_chat(), user(), "/verify"),
            InboundUpdate::Command { command: BotCommand::Verify, .. }
        ));
        assert!(matches!(
            InboundUpdate::from_message(private_chat(), user(), "hello"),
            InboundUpdate::Text { .. }
        ));
    }

    #[test]
    fn display_handle_prefers_username() {
        let mut u = user();
        assert_eq!(u.display_handle(), "Ana");
        u.username = Some("ana_p".into());
        assert_eq!(u.display_handle(), "@ana_p");
    }

    #[test]
    fn bot_presence() {
        assert!(BotMembership::Administrator.is_present());
        assert!(!BotMembership::Kicked.is_present());
        assert!(!BotMembership::Left.is_present());
    }
}
