//! PostgreSQL implementation of MembershipRepository.
//!
//! One row per (integration, e-mail) in `membership_records`. The invite
//! token and its expiry are stored flat beside the record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    ChatUserId, DomainError, ErrorCode, IntegrationId, MembershipId, Timestamp,
};
use crate::domain::membership::{
    ChatIdentityLink, Email, InviteToken, MembershipRecord, MembershipStatus, RemovalReason,
};
use crate::ports::MembershipRepository;

const COLUMNS: &str = r#"
    id, integration_id, email, external_subscriber_id, chat_user_id, chat_handle,
    status, joined_at, verified_at, last_payment_check, removal_warning_at,
    removed_at, removal_reason, invite_token, invite_expires_at, created_at, updated_at
"#;

/// PostgreSQL implementation of the MembershipRepository port.
pub struct PostgresMembershipRepository {
    pool: PgPool,
}

impl PostgresMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a membership record.
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    id: Uuid,
    integration_id: Uuid,
    email: String,
    external_subscriber_id: Option<String>,
    chat_user_id: Option<i64>,
    chat_handle: Option<String>,
    status: String,
    joined_at: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    last_payment_check: Option<DateTime<Utc>>,
    removal_warning_at: Option<DateTime<Utc>>,
    removed_at: Option<DateTime<Utc>>,
    removal_reason: Option<String>,
    invite_token: Option<String>,
    invite_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for MembershipRecord {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid stored email: {}", e))
        })?;
        let status: MembershipStatus = row.status.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid status value: {}", e))
        })?;

        let identity = row.chat_user_id.map(|user_id| ChatIdentityLink {
            user_id: ChatUserId::new(user_id),
            handle: row.chat_handle,
        });
        let invite = match (row.invite_token, row.invite_expires_at) {
            (Some(token), Some(expires_at)) => Some(InviteToken {
                token,
                expires_at: Timestamp::from_datetime(expires_at),
            }),
            _ => None,
        };

        Ok(MembershipRecord::reconstitute(
            MembershipId::from_uuid(row.id),
            IntegrationId::from_uuid(row.integration_id),
            email,
            row.external_subscriber_id,
            identity,
            status,
            row.joined_at.map(Timestamp::from_datetime),
            row.verified_at.map(Timestamp::from_datetime),
            row.last_payment_check.map(Timestamp::from_datetime),
            row.removal_warning_at.map(Timestamp::from_datetime),
            row.removed_at.map(Timestamp::from_datetime),
            row.removal_reason.map(RemovalReason::from),
            invite,
            Timestamp::from_datetime(row.created_at),
            Timestamp::from_datetime(row.updated_at),
        ))
    }
}

/// `SELECT` over every column, oldest record first.
fn select(filter: &str) -> String {
    format!(
        "SELECT {} FROM membership_records WHERE {} ORDER BY created_at",
        COLUMNS, filter
    )
}

fn fetch_failed(e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to fetch memberships: {}", e))
}

fn optional_time(value: Option<Timestamp>) -> Option<DateTime<Utc>> {
    value.map(Timestamp::into_datetime)
}

fn status_strings(statuses: &[MembershipStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl MembershipRepository for PostgresMembershipRepository {
    async fn insert(&self, record: &MembershipRecord) -> Result<bool, DomainError> {
        let invite = record.invite();
        let result = sqlx::query(
            r#"
            INSERT INTO membership_records (
                id, integration_id, email, external_subscriber_id, chat_user_id, chat_handle,
                status, joined_at, verified_at, last_payment_check, removal_warning_at,
                removed_at, removal_reason, invite_token, invite_expires_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT ON CONSTRAINT membership_records_integration_email_key DO NOTHING
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.integration_id().as_uuid())
        .bind(record.email().as_str())
        .bind(record.external_subscriber_id())
        .bind(record.chat_user_id().map(|u| u.value()))
        .bind(record.identity().and_then(|i| i.handle.as_deref()))
        .bind(record.status().as_str())
        .bind(optional_time(record.joined_at()))
        .bind(optional_time(record.verified_at()))
        .bind(optional_time(record.last_payment_check()))
        .bind(optional_time(record.removal_warning_at()))
        .bind(optional_time(record.removed_at()))
        .bind(record.removal_reason().map(|r| r.as_str()))
        .bind(invite.map(|i| i.token.as_str()))
        .bind(invite.map(|i| i.expires_at.into_datetime()))
        .bind(record.created_at().as_datetime())
        .bind(record.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to insert membership: {}", e))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, record: &MembershipRecord) -> Result<(), DomainError> {
        let invite = record.invite();
        let result = sqlx::query(
            r#"
            UPDATE membership_records SET
                external_subscriber_id = $2,
                chat_user_id = $3,
                chat_handle = $4,
                status = $5,
                joined_at = $6,
                verified_at = $7,
                last_payment_check = $8,
                removal_warning_at = $9,
                removed_at = $10,
                removal_reason = $11,
                invite_token = $12,
                invite_expires_at = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.external_subscriber_id())
        .bind(record.chat_user_id().map(|u| u.value()))
        .bind(record.identity().and_then(|i| i.handle.as_deref()))
        .bind(record.status().as_str())
        .bind(optional_time(record.joined_at()))
        .bind(optional_time(record.verified_at()))
        .bind(optional_time(record.last_payment_check()))
        .bind(optional_time(record.removal_warning_at()))
        .bind(optional_time(record.removed_at()))
        .bind(record.removal_reason().map(|r| r.as_str()))
        .bind(invite.map(|i| i.token.as_str()))
        .bind(invite.map(|i| i.expires_at.into_datetime()))
        .bind(record.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("membership_records_invite_token_idx") {
                    return DomainError::new(ErrorCode::InternalError, "Invite token collision");
                }
            }
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update membership: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::MemberNotFound,
                format!("Membership {} not found", record.id()),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: MembershipId) -> Result<Option<MembershipRecord>, DomainError> {
        let row = sqlx::query_as::<_, MembershipRow>(&select("id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(fetch_failed)?;

        row.map(MembershipRecord::try_from).transpose()
    }

    async fn find_by_integration_and_email(
        &self,
        integration_id: IntegrationId,
        email: &Email,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        let row = sqlx::query_as::<_, MembershipRow>(&select(
            "integration_id = $1 AND email = $2",
        ))
        .bind(integration_id.as_uuid())
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(fetch_failed)?;

        row.map(MembershipRecord::try_from).transpose()
    }

    async fn find_by_invite_token(
        &self,
        token: &str,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        let row = sqlx::query_as::<_, MembershipRow>(&select("invite_token = $1"))
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(fetch_failed)?;

        row.map(MembershipRecord::try_from).transpose()
    }

    async fn find_by_chat_user(
        &self,
        integration_id: IntegrationId,
        user_id: ChatUserId,
    ) -> Result<Option<MembershipRecord>, DomainError> {
        let row = sqlx::query_as::<_, MembershipRow>(&select(
            "integration_id = $1 AND chat_user_id = $2 AND status <> 'removed'",
        ))
        .bind(integration_id.as_uuid())
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(fetch_failed)?;

        row.map(MembershipRecord::try_from).transpose()
    }

    async fn list_by_statuses(
        &self,
        integration_id: IntegrationId,
        statuses: &[MembershipStatus],
    ) -> Result<Vec<MembershipRecord>, DomainError> {
        let rows = sqlx::query_as::<_, MembershipRow>(&select(
            "integration_id = $1 AND status = ANY($2)",
        ))
        .bind(integration_id.as_uuid())
        .bind(status_strings(statuses))
        .fetch_all(&self.pool)
        .await
        .map_err(fetch_failed)?;

        rows.into_iter().map(MembershipRecord::try_from).collect()
    }

    async fn list_overdue_unwarned(&self) -> Result<Vec<MembershipRecord>, DomainError> {
        let rows = sqlx::query_as::<_, MembershipRow>(&select(
            "status = 'payment_overdue' AND removal_warning_at IS NULL",
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(fetch_failed)?;

        rows.into_iter().map(MembershipRecord::try_from).collect()
    }

    async fn list_overdue_checked_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<MembershipRecord>, DomainError> {
        let rows = sqlx::query_as::<_, MembershipRow>(&select(
            "status = 'payment_overdue' AND last_payment_check < $1",
        ))
        .bind(cutoff.into_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(fetch_failed)?;

        rows.into_iter().map(MembershipRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> MembershipRow {
        let now = Utc::now();
        MembershipRow {
            id: Uuid::new_v4(),
            integration_id: Uuid::new_v4(),
            email: "fan@example.com".into(),
            external_subscriber_id: Some("sub-1".into()),
            chat_user_id: Some(42),
            chat_handle: Some("@fan".into()),
            status: status.into(),
            joined_at: Some(now),
            verified_at: Some(now),
            last_payment_check: Some(now),
            removal_warning_at: None,
            removed_at: None,
            removal_reason: None,
            invite_token: Some("tok".into()),
            invite_expires_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_maps_identity_and_invite() {
        let record = MembershipRecord::try_from(row("active")).unwrap();

        assert_eq!(record.status(), MembershipStatus::Active);
        assert_eq!(record.chat_user_id(), Some(ChatUserId::new(42)));
        assert_eq!(record.identity().unwrap().handle.as_deref(), Some("@fan"));
        assert_eq!(record.invite().unwrap().token, "tok");
    }

    #[test]
    fn half_stored_invite_is_dropped() {
        let mut r = row("active");
        r.invite_expires_at = None;
        let record = MembershipRecord::try_from(r).unwrap();
        assert!(record.invite().is_none());
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let err = MembershipRecord::try_from(row("banned")).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn removal_reason_text_survives_the_row() {
        let mut r = row("removed");
        r.removal_reason = Some("payment_overdue_automatic".into());
        let record = MembershipRecord::try_from(r).unwrap();
        assert_eq!(
            record.removal_reason(),
            Some(&RemovalReason::PaymentOverdueAutomatic)
        );
    }
}
