//! PostgreSQL implementation of DiscoveredGroupStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, Timestamp};
use crate::domain::groups::{DiscoveredGroup, GroupKind, MemberPermissions};
use crate::ports::DiscoveredGroupStore;

pub struct PostgresGroupStore {
    pool: PgPool,
}

impl PostgresGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    chat_id: i64,
    title: String,
    kind: String,
    permissions: Json<MemberPermissions>,
    refreshed_at: DateTime<Utc>,
}

impl TryFrom<GroupRow> for DiscoveredGroup {
    type Error = DomainError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let kind: GroupKind = row.kind.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid group kind: {}", e))
        })?;

        Ok(DiscoveredGroup {
            chat_id: ChatId::new(row.chat_id),
            title: row.title,
            kind,
            permissions: row.permissions.0,
            refreshed_at: Timestamp::from_datetime(row.refreshed_at),
        })
    }
}

#[async_trait]
impl DiscoveredGroupStore for PostgresGroupStore {
    async fn upsert(&self, group: &DiscoveredGroup) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO discovered_groups (chat_id, title, kind, permissions, refreshed_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chat_id) DO UPDATE SET
                title = EXCLUDED.title,
                kind = EXCLUDED.kind,
                permissions = EXCLUDED.permissions,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(group.chat_id.value())
        .bind(&group.title)
        .bind(group.kind.as_str())
        .bind(Json(&group.permissions))
        .bind(group.refreshed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert group: {}", e)))?;

        Ok(())
    }

    async fn find(&self, chat_id: ChatId) -> Result<Option<DiscoveredGroup>, DomainError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT chat_id, title, kind, permissions, refreshed_at
            FROM discovered_groups
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch group: {}", e)))?;

        row.map(DiscoveredGroup::try_from).transpose()
    }

    async fn delete(&self, chat_id: ChatId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM discovered_groups WHERE chat_id = $1")
            .bind(chat_id.value())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to delete group: {}", e)))?;

        Ok(())
    }

    async fn list_eligible(&self) -> Result<Vec<DiscoveredGroup>, DomainError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT chat_id, title, kind, permissions, refreshed_at
            FROM discovered_groups
            WHERE kind <> 'private'
            ORDER BY title, chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list groups: {}", e)))?;

        // Rights live in JSONB; the domain rule decides eligibility.
        let groups = rows
            .into_iter()
            .map(DiscoveredGroup::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups.into_iter().filter(DiscoveredGroup::is_eligible).collect())
    }
}
