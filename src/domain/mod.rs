//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machine)
//! - `campaign` - Read model of campaigns and their reward tiers
//! - `integration` - Campaign ↔ group bindings and access policy
//! - `membership` - Per-supporter lifecycle inside a gated group
//! - `access` - Entitlement evaluation and access grants
//! - `authorization` - Handshake session state machine and login proofs
//! - `groups` - Chats the bot administers
//! - `chat` - Transport-neutral inbound updates
//! - `webhook` - Platform webhook events and signatures
//! - `journal` - Audit log entries

pub mod access;
pub mod authorization;
pub mod campaign;
pub mod chat;
pub mod foundation;
pub mod groups;
pub mod integration;
pub mod journal;
pub mod membership;
pub mod webhook;
