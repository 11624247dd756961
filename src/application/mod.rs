//! Application layer - services orchestrating the domain through ports.
//!
//! Each service holds its ports as `Arc<dyn Port>` and is itself shared as
//! an `Arc` by the HTTP routes, the bot consumer and the queue workers.
//!
//! ## Services
//!
//! - [`AuthorizationSessionManager`] - the maker's connect handshake
//! - [`MembershipLedger`] - every membership state change, journaled
//! - [`AccessVerifier`] - entitlement lookup and policy evaluation
//! - [`InviteIssuer`] - single-use invite links
//! - [`GroupDiscoveryRegistry`] - groups the bot administers
//! - [`reconciliation`] - scheduled re-verification
//! - [`PlatformWebhookHandler`], [`BotUpdateHandler`] - inbound events
//! - [`IntegrationAdmin`] - operator actions

mod access_verifier;
mod bot_handler;
mod group_discovery;
mod integration_admin;
mod invite_issuer;
mod membership_ledger;
mod platform_webhook;
pub mod reconciliation;
mod session_manager;

#[cfg(test)]
pub(crate) mod test_support;

pub use access_verifier::{AccessError, AccessVerifier};
pub use bot_handler::{
    BotReaction, BotUpdateHandler, EXPIRED_LINK_TEXT, GENERIC_FAILURE_TEXT, HELP_TEXT,
    NOT_AN_EMAIL_TEXT, NO_GROUPS_TEXT, VERIFY_PROMPT, WELCOME_TEXT,
};
pub use group_discovery::GroupDiscoveryRegistry;
pub use integration_admin::{AdminError, IntegrationAdmin};
pub use invite_issuer::{InviteError, InviteIssuer, IssuedInvite};
pub use membership_ledger::MembershipLedger;
pub use platform_webhook::{PlatformWebhookHandler, WebhookHandlingError, WebhookOutcome};
pub use session_manager::{AuthorizationSessionManager, SessionManagerDeps};

use crate::domain::journal::JournalEntry;
use crate::ports::EventJournal;

/// Appends to the journal, logging instead of failing. The state change that
/// produced the entry stands either way.
pub(crate) async fn journal_best_effort(journal: &dyn EventJournal, entry: JournalEntry) {
    let event_type = entry.event_type;
    if let Err(err) = journal.append(entry).await {
        tracing::warn!(event_type = event_type.as_str(), error = %err, "Journal append failed");
    }
}
