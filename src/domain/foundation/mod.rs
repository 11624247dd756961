//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and the error
//! vocabulary used by every other domain module.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ErrorKind, ValidationError};
pub use ids::{ChatId, ChatUserId, IntegrationId, MembershipId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
