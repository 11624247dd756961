//! Membership repository port (write side).
//!
//! Defines the contract for persisting and retrieving membership records.
//!
//! # Design
//!
//! - **Unique constraint**: one record per (integration, email); removal
//!   reuses the row rather than inserting a second one
//! - **Sweep queries**: the warning and removal sweeps query across every
//!   integration at once

use crate::domain::foundation::{ChatUserId, DomainError, IntegrationId, MembershipId, Timestamp};
use crate::domain::membership::{Email, MembershipRecord, MembershipStatus};
use async_trait::async_trait;

/// Repository port for membership record persistence.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a new record.
    ///
    /// Returns `false` without writing when a record for the same
    /// (integration, email) already exists.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, record: &MembershipRecord) -> Result<bool, DomainError>;

    /// Update an existing record.
    ///
    /// # Errors
    ///
    /// - `MemberNotFound` if the record doesn't exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, record: &MembershipRecord) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: MembershipId) -> Result<Option<MembershipRecord>, DomainError>;

    async fn find_by_integration_and_email(
        &self,
        integration_id: IntegrationId,
        email: &Email,
    ) -> Result<Option<MembershipRecord>, DomainError>;

    /// Find the record holding `token`, regardless of the token's expiry.
    async fn find_by_invite_token(
        &self,
        token: &str,
    ) -> Result<Option<MembershipRecord>, DomainError>;

    /// Find the non-removed record linked to a chat user within one integration.
    async fn find_by_chat_user(
        &self,
        integration_id: IntegrationId,
        user_id: ChatUserId,
    ) -> Result<Option<MembershipRecord>, DomainError>;

    /// Records of one integration in any of `statuses`, oldest first.
    async fn list_by_statuses(
        &self,
        integration_id: IntegrationId,
        statuses: &[MembershipStatus],
    ) -> Result<Vec<MembershipRecord>, DomainError>;

    /// Overdue records that have not been warned yet.
    async fn list_overdue_unwarned(&self) -> Result<Vec<MembershipRecord>, DomainError>;

    /// Overdue records whose last payment check is before `cutoff`.
    async fn list_overdue_checked_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipRecord>, DomainError>;
}
