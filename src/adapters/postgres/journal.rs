//! PostgreSQL implementation of EventJournal. Append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, IntegrationId, MembershipId, Timestamp};
use crate::domain::journal::{JournalEntry, JournalEventType};
use crate::ports::EventJournal;

pub struct PostgresEventJournal {
    pool: PgPool,
}

impl PostgresEventJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JournalRow {
    id: Uuid,
    event_type: String,
    integration_id: Option<Uuid>,
    membership_id: Option<Uuid>,
    external_user_id: Option<String>,
    metadata: Json<serde_json::Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JournalRow> for JournalEntry {
    type Error = DomainError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        let event_type: JournalEventType = row.event_type.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid event type: {}", e))
        })?;

        Ok(JournalEntry {
            id: row.id,
            event_type,
            integration_id: row.integration_id.map(IntegrationId::from_uuid),
            membership_id: row.membership_id.map(MembershipId::from_uuid),
            external_user_id: row.external_user_id,
            metadata: row.metadata.0,
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl EventJournal for PostgresEventJournal {
    async fn append(&self, entry: JournalEntry) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO event_journal (
                id, event_type, integration_id, membership_id, external_user_id,
                metadata, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(entry.event_type.as_str())
        .bind(entry.integration_id.map(|id| *id.as_uuid()))
        .bind(entry.membership_id.map(|id| *id.as_uuid()))
        .bind(&entry.external_user_id)
        .bind(Json(&entry.metadata))
        .bind(&entry.error_message)
        .bind(entry.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to append journal entry: {}", e)))?;

        Ok(())
    }

    async fn list_for_integration(
        &self,
        integration_id: IntegrationId,
        limit: u32,
    ) -> Result<Vec<JournalEntry>, DomainError> {
        let rows = sqlx::query_as::<_, JournalRow>(
            r#"
            SELECT id, event_type, integration_id, membership_id, external_user_id,
                   metadata, error_message, created_at
            FROM event_journal
            WHERE integration_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(integration_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read journal: {}", e)))?;

        rows.into_iter().map(JournalEntry::try_from).collect()
    }
}
