//! Membership module - per-supporter standing inside a gated group.
//!
//! # Module Structure
//!
//! - `status` - MembershipStatus state machine
//! - `record` - MembershipRecord aggregate, invite tokens, removal reasons
//! - `email` - normalised supporter address
//! - `errors` - MembershipError

mod email;
mod errors;
mod record;
mod status;

pub use email::Email;
pub use errors::MembershipError;
pub use record::{ChatIdentityLink, InviteToken, MembershipRecord, RemovalReason, Transition};
pub use status::MembershipStatus;
