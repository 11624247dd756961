//! Raw teloxide updates to [`InboundUpdate`].
//!
//! Only what the bot reacts to survives: text and commands, member joins and
//! departures, and changes to the bot's own membership. Everything else
//! converts to `None`.

use teloxide::types::{Chat, ChatMemberKind, Message, Update, UpdateKind, User};

use crate::domain::chat::{BotMembership, ChatRef, ChatUser, InboundUpdate};
use crate::domain::foundation::{ChatId, ChatUserId};
use crate::domain::groups::GroupKind;

pub(crate) fn group_kind(chat: &Chat) -> GroupKind {
    if chat.is_private() {
        GroupKind::Private
    } else if chat.is_channel() {
        GroupKind::Channel
    } else if chat.is_supergroup() {
        GroupKind::Supergroup
    } else {
        GroupKind::Group
    }
}

fn chat_ref(chat: &Chat) -> ChatRef {
    ChatRef {
        id: ChatId::new(chat.id.0),
        kind: group_kind(chat),
        title: chat.title().map(str::to_string),
    }
}

fn chat_user(user: &User) -> ChatUser {
    ChatUser {
        id: ChatUserId::new(user.id.0 as i64),
        is_bot: user.is_bot,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
    }
}

fn bot_membership(kind: &ChatMemberKind) -> BotMembership {
    if kind.is_owner() || kind.is_administrator() {
        BotMembership::Administrator
    } else if kind.is_restricted() {
        BotMembership::Restricted
    } else if kind.is_left() {
        BotMembership::Left
    } else if kind.is_banned() {
        BotMembership::Kicked
    } else {
        BotMembership::Member
    }
}

fn from_message(msg: &Message) -> Option<InboundUpdate> {
    let chat = chat_ref(&msg.chat);

    if let Some(members) = msg.new_chat_members() {
        return Some(InboundUpdate::MembersJoined {
            chat,
            members: members.iter().map(chat_user).collect(),
        });
    }
    if let Some(member) = msg.left_chat_member() {
        return Some(InboundUpdate::MemberLeft {
            chat,
            member: chat_user(member),
        });
    }

    let from = msg.from.as_ref()?;
    let text = msg.text()?;
    Some(InboundUpdate::from_message(chat, chat_user(from), text))
}

pub fn to_inbound(update: Update) -> Option<InboundUpdate> {
    match update.kind {
        UpdateKind::Message(msg) => from_message(&msg),
        UpdateKind::MyChatMember(change) => Some(InboundUpdate::BotMembershipChanged {
            chat: chat_ref(&change.chat),
            status: bot_membership(&change.new_chat_member.kind),
        }),
        _ => None,
    }
}
