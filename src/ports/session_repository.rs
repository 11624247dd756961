//! Authorization session repository port.
//!
//! Sessions are keyed by their opaque token. Every handshake step loads the
//! session, applies one transition and saves it back, so `save` is an upsert.

use crate::domain::authorization::{AuthorizationSession, SessionToken};
use crate::domain::foundation::{DomainError, Timestamp};
use async_trait::async_trait;

/// Repository port for handshake sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or overwrite the session stored under its token.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn save(&self, session: &AuthorizationSession) -> Result<(), DomainError>;

    /// Find a session by token.
    ///
    /// Returns `None` if no session was ever stored under the token, or it has
    /// been purged.
    async fn find(&self, token: &SessionToken) -> Result<Option<AuthorizationSession>, DomainError>;

    /// Delete every session whose expiry is before `cutoff`.
    ///
    /// Returns the number of sessions removed.
    async fn delete_expired_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}
