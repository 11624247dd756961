//! BotUpdateHandler - reacts to chat updates.
//!
//! Works on [`InboundUpdate`] only, so long-polling and webhook push share
//! the same logic. A failing update is logged and answered with a generic
//! reply; it never stops the consumer.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;

use crate::domain::access::{AccessDecision, AccessGrant};
use crate::domain::chat::{BotCommand, ChatRef, ChatUser, InboundUpdate};
use crate::domain::foundation::{ChatUserId, DomainError, ErrorKind, MembershipId};
use crate::domain::integration::Integration;
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::domain::membership::{Email, MembershipError};
use crate::ports::{EventJournal, IntegrationRepository, MessagingGateway};

use super::{
    journal_best_effort, AccessError, AccessVerifier, GroupDiscoveryRegistry, InviteError,
    InviteIssuer, MembershipLedger,
};

pub const WELCOME_TEXT: &str = "Hi! I manage access to supporter-only groups.\n\
Send me the e-mail address you support the campaign with and I will check your access.";

pub const HELP_TEXT: &str = "Commands:\n\
/verify - check your supporter access\n\
/help - show this message\n\n\
You can also just send me your e-mail address.";

pub const VERIFY_PROMPT: &str = "Please send the e-mail address you use on the campaign.";

pub const NOT_AN_EMAIL_TEXT: &str =
    "That does not look like an e-mail address. Send /help to see what I can do.";

pub const EXPIRED_LINK_TEXT: &str =
    "This link has expired or was already used. Send me your e-mail address to get a new one.";

pub const NO_GROUPS_TEXT: &str = "There are no supporter groups to join right now.";

pub const GENERIC_FAILURE_TEXT: &str = "Something went wrong on our side. Please try again later.";

pub const PARTIAL_FAILURE_TEXT: &str =
    "Some groups could not be checked right now. Send your e-mail again later to retry them.";

/// What the handler did with one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotReaction {
    Replied,
    Linked { membership_id: MembershipId },
    Verified {
        issued: usize,
        denied: usize,
        failed: usize,
    },
    Greeted { members: usize },
    Departed { removed: bool },
    GroupObserved { eligible: bool },
    GroupForgotten,
    Ignored,
    /// Handling failed; the user got the generic reply.
    Failed,
}

#[derive(Debug, Error)]
enum BotError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Invite(#[from] InviteError),
}

pub struct BotUpdateHandler {
    integrations: Arc<dyn IntegrationRepository>,
    ledger: Arc<MembershipLedger>,
    verifier: Arc<AccessVerifier>,
    invites: Arc<InviteIssuer>,
    registry: Arc<GroupDiscoveryRegistry>,
    gateway: Arc<dyn MessagingGateway>,
    journal: Arc<dyn EventJournal>,
}

impl BotUpdateHandler {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        ledger: Arc<MembershipLedger>,
        verifier: Arc<AccessVerifier>,
        invites: Arc<InviteIssuer>,
        registry: Arc<GroupDiscoveryRegistry>,
        gateway: Arc<dyn MessagingGateway>,
        journal: Arc<dyn EventJournal>,
    ) -> Self {
        Self {
            integrations,
            ledger,
            verifier,
            invites,
            registry,
            gateway,
            journal,
        }
    }

    pub async fn handle(&self, update: InboundUpdate) -> BotReaction {
        let chat_id = update.chat().id;
        let sender = match &update {
            InboundUpdate::Command { from, .. } | InboundUpdate::Text { from, .. } => Some(from.id),
            _ => None,
        };

        match self.dispatch(update).await {
            Ok(reaction) => reaction,
            Err(err) => {
                tracing::error!(chat_id = %chat_id, error = %err, "Update handling failed");
                if let Some(user_id) = sender {
                    self.reply(user_id, GENERIC_FAILURE_TEXT).await;
                }
                BotReaction::Failed
            }
        }
    }

    async fn dispatch(&self, update: InboundUpdate) -> Result<BotReaction, BotError> {
        match update {
            InboundUpdate::Command {
                chat,
                from,
                command,
            } => self.command(&chat, &from, command).await,
            InboundUpdate::Text { chat, from, text } => {
                if !chat.is_private() {
                    return Ok(BotReaction::Ignored);
                }
                self.verify_email(&from, &text).await
            }
            InboundUpdate::MembersJoined { chat, members } => self.members_joined(&chat, &members).await,
            InboundUpdate::MemberLeft { chat, member } => self.member_left(&chat, &member).await,
            InboundUpdate::BotMembershipChanged { chat, status } => {
                if status.is_present() {
                    let group = self.registry.observe(chat.id).await?;
                    Ok(BotReaction::GroupObserved {
                        eligible: group.is_eligible(),
                    })
                } else {
                    self.registry.forget(chat.id).await?;
                    Ok(BotReaction::GroupForgotten)
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    async fn command(
        &self,
        chat: &ChatRef,
        from: &ChatUser,
        command: BotCommand,
    ) -> Result<BotReaction, BotError> {
        match command {
            BotCommand::Start { payload: Some(token) } if chat.is_private() => {
                self.redeem_token(from, &token).await
            }
            BotCommand::Start { .. } => {
                self.reply(from.id, WELCOME_TEXT).await;
                Ok(BotReaction::Replied)
            }
            BotCommand::Help => {
                self.reply(from.id, HELP_TEXT).await;
                Ok(BotReaction::Replied)
            }
            BotCommand::Verify => {
                self.reply(from.id, VERIFY_PROMPT).await;
                Ok(BotReaction::Replied)
            }
            BotCommand::Register if !chat.is_private() => {
                let Some(group) = self.registry.revalidate(chat.id).await? else {
                    return Ok(BotReaction::GroupForgotten);
                };
                let text = if group.is_eligible() {
                    format!("{} is ready to be connected to a campaign.", group.title)
                } else {
                    format!(
                        "I need to be an administrator of {} with rights to invite users and manage the chat.",
                        group.title
                    )
                };
                self.reply(from.id, &text).await;
                Ok(BotReaction::GroupObserved {
                    eligible: group.is_eligible(),
                })
            }
            BotCommand::Register => {
                self.reply(from.id, "Send /register inside the group you want to connect.")
                    .await;
                Ok(BotReaction::Replied)
            }
            BotCommand::Unknown(name) => {
                tracing::debug!(command = %name, "Unknown bot command");
                self.reply(from.id, HELP_TEXT).await;
                Ok(BotReaction::Replied)
            }
        }
    }

    /// `/start <token>` from an invite deep link: link the chat account,
    /// then re-check access and deliver a fresh group link.
    async fn redeem_token(&self, from: &ChatUser, token: &str) -> Result<BotReaction, BotError> {
        let Some(record) = self.ledger.find_by_invite_token(token).await? else {
            self.reply(from.id, EXPIRED_LINK_TEXT).await;
            return Ok(BotReaction::Replied);
        };

        let Some(record) = self
            .ledger
            .link_identity(
                record.integration_id(),
                record.email(),
                from.id,
                Some(from.display_handle()),
            )
            .await?
        else {
            self.reply(from.id, EXPIRED_LINK_TEXT).await;
            return Ok(BotReaction::Replied);
        };

        if let Some(integration) = self.integrations.find_by_id(record.integration_id()).await? {
            if let AccessDecision::Granted(grant) = self
                .verifier
                .check_integration(&integration, record.email())
                .await?
            {
                self.invites.issue(&grant, None).await?;
            }
        }

        Ok(BotReaction::Linked {
            membership_id: record.id(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // E-mail verification
    // ─────────────────────────────────────────────────────────────────────────

    async fn verify_email(&self, from: &ChatUser, text: &str) -> Result<BotReaction, BotError> {
        let text = text.trim();
        if !Email::looks_like(text) {
            self.reply(from.id, NOT_AN_EMAIL_TEXT).await;
            return Ok(BotReaction::Replied);
        }
        let email = match Email::parse(text) {
            Ok(email) => email,
            Err(_) => {
                self.reply(from.id, NOT_AN_EMAIL_TEXT).await;
                return Ok(BotReaction::Replied);
            }
        };

        let integrations = self.integrations.list_active().await?;
        if integrations.is_empty() {
            self.reply(from.id, NO_GROUPS_TEXT).await;
            return Ok(BotReaction::Replied);
        }

        let (mut issued, mut denied, mut failed) = (0, 0, 0);
        for integration in &integrations {
            match self.verify_for(integration, from, &email).await {
                Ok(true) => issued += 1,
                Ok(false) => denied += 1,
                Err(err) => {
                    failed += 1;
                    self.journal_failure(integration, from, &err.to_string()).await;
                }
            }
        }

        if failed > 0 {
            if issued + denied == 0 {
                self.reply(from.id, GENERIC_FAILURE_TEXT).await;
                return Ok(BotReaction::Failed);
            }
            self.reply(from.id, PARTIAL_FAILURE_TEXT).await;
        }

        Ok(BotReaction::Verified {
            issued,
            denied,
            failed,
        })
    }

    /// Checks one integration. `Ok(true)` when an invite went out.
    async fn verify_for(
        &self,
        integration: &Integration,
        from: &ChatUser,
        email: &Email,
    ) -> Result<bool, BotError> {
        match self.verifier.check_integration(integration, email).await? {
            AccessDecision::Granted(grant) => {
                self.admit(integration, from, &grant).await?;
                Ok(true)
            }
            AccessDecision::Denied(reason) => {
                let text = format!("{}: {}", integration.group().title, reason.user_message());
                self.reply(from.id, &text).await;
                Ok(false)
            }
        }
    }

    async fn journal_failure(&self, integration: &Integration, from: &ChatUser, message: &str) {
        tracing::warn!(
            integration_id = %integration.id(),
            user_id = %from.id,
            error = %message,
            "E-mail verification failed for integration"
        );
        journal_best_effort(
            self.journal.as_ref(),
            JournalEntry::new(JournalEventType::Error)
                .with_integration(integration.id())
                .with_external_user(from.id)
                .with_error(message)
                .with_metadata(json!({ "stage": "email_verification" })),
        )
        .await;
    }

    async fn admit(
        &self,
        integration: &Integration,
        from: &ChatUser,
        grant: &AccessGrant,
    ) -> Result<(), BotError> {
        let invite = self.invites.issue(grant, None).await?;

        match self
            .ledger
            .link_identity(
                integration.id(),
                grant.email(),
                from.id,
                Some(from.display_handle()),
            )
            .await
        {
            Ok(_) => {}
            // An overdue member who paid again keeps their record until
            // the next sync recovers it.
            Err(err) if err.kind() == ErrorKind::State => {
                tracing::debug!(membership_id = %invite.membership_id, error = %err, "Identity not linked");
            }
            Err(err) => return Err(err.into()),
        }

        if !invite.delivered {
            let text = format!(
                "Welcome! Join {} here: {}\nThe link works once.",
                integration.group().title,
                invite.link
            );
            self.reply(from.id, &text).await;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Membership changes
    // ─────────────────────────────────────────────────────────────────────────

    async fn members_joined(
        &self,
        chat: &ChatRef,
        members: &[ChatUser],
    ) -> Result<BotReaction, BotError> {
        let integration = self.integrations.find_by_chat(chat.id).await?;
        let title = chat.title.clone().unwrap_or_else(|| "the group".to_string());
        let mut greeted = 0;

        for member in members.iter().filter(|m| !m.is_bot) {
            let text = format!(
                "Welcome to {}! Your access is tied to your supporter status. \
                 If you have not done so yet, send me the e-mail address you support with.",
                title
            );
            self.reply(member.id, &text).await;
            greeted += 1;

            if let Some(integration) = &integration {
                journal_best_effort(
                    self.journal.as_ref(),
                    JournalEntry::new(JournalEventType::MemberJoined)
                        .with_integration(integration.id())
                        .with_external_user(member.id)
                        .with_metadata(json!({ "handle": member.display_handle() })),
                )
                .await;
            }
        }

        Ok(BotReaction::Greeted { members: greeted })
    }

    async fn member_left(&self, chat: &ChatRef, member: &ChatUser) -> Result<BotReaction, BotError> {
        if member.is_bot {
            return Ok(BotReaction::Ignored);
        }
        let Some(integration) = self.integrations.find_by_chat(chat.id).await? else {
            return Ok(BotReaction::Ignored);
        };
        let outcome = self.ledger.record_departure(integration.id(), member.id).await?;
        Ok(BotReaction::Departed {
            removed: outcome.is_some_and(|t| t.is_applied()),
        })
    }

    async fn reply(&self, user_id: ChatUserId, text: &str) {
        if let Err(err) = self.gateway.send_direct_message(user_id, text).await {
            tracing::warn!(user_id = %user_id, error = %err, "Reply not delivered");
        }
    }
}
