//! Supporter Gate - membership of private Telegram groups tied to
//! crowdfunding support.
//!
//! A maker connects a campaign to a group through the handshake; supporters
//! verify their e-mail with the bot and receive single-use invites; the
//! reconciliation jobs re-check every member on a schedule and remove those
//! who stopped paying.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod observability;
pub mod ports;
