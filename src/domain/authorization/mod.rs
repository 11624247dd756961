//! Authorization module - the handshake that connects a campaign to a group.
//!
//! - `session` - AuthorizationSession value and the pure `transition` function
//! - `identity_proof` - Telegram login widget verification
//! - `errors` - SessionError

mod errors;
mod identity_proof;
mod session;

pub use errors::SessionError;
pub use identity_proof::{IdentityProof, IdentityVerifier, ProofError, DEFAULT_MAX_PROOF_AGE_SECS};
pub use session::{
    transition, AuthorizationSession, ChatIdentity, SelectedGroup, SessionEvent, SessionStatus,
    SessionToken, TemporaryCredentials, DEFAULT_SESSION_TTL_MINUTES,
};
