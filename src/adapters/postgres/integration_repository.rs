//! PostgreSQL implementation of IntegrationRepository.
//!
//! The one-group-one-integration rule is the `integrations_chat_id_key`
//! unique constraint; a violation surfaces as `GroupAlreadyBound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{ChatId, DomainError, ErrorCode, IntegrationId, Timestamp};
use crate::domain::groups::GroupKind;
use crate::domain::integration::{
    AccessPolicy, ApiKey, GroupBinding, Integration, ProviderCredentials,
};
use crate::ports::IntegrationRepository;

const SELECT_INTEGRATION: &str = r#"
    SELECT id, campaign_id, campaign_slug, created_by, chat_id, group_title, group_kind,
           policy, api_key, provider_api_key, provider_bearer_token, is_active,
           created_at, updated_at
    FROM integrations
"#;

pub struct PostgresIntegrationRepository {
    pool: PgPool,
}

impl PostgresIntegrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IntegrationRow {
    id: Uuid,
    campaign_id: String,
    campaign_slug: String,
    created_by: String,
    chat_id: i64,
    group_title: String,
    group_kind: String,
    policy: Json<AccessPolicy>,
    api_key: String,
    provider_api_key: String,
    provider_bearer_token: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = DomainError;

    fn try_from(row: IntegrationRow) -> Result<Self, Self::Error> {
        let kind: GroupKind = row.group_kind.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid group kind: {}", e))
        })?;

        Ok(Integration::reconstitute(
            IntegrationId::from_uuid(row.id),
            row.campaign_id,
            row.campaign_slug,
            row.created_by,
            GroupBinding {
                chat_id: ChatId::new(row.chat_id),
                title: row.group_title,
                kind,
            },
            row.policy.0,
            ApiKey::from_string(row.api_key),
            ProviderCredentials {
                api_key: row.provider_api_key,
                bearer_token: SecretString::new(row.provider_bearer_token),
            },
            row.is_active,
            Timestamp::from_datetime(row.created_at),
            Timestamp::from_datetime(row.updated_at),
        ))
    }
}

fn rows_into(rows: Vec<IntegrationRow>) -> Result<Vec<Integration>, DomainError> {
    rows.into_iter().map(Integration::try_from).collect()
}

#[async_trait]
impl IntegrationRepository for PostgresIntegrationRepository {
    async fn create(&self, integration: &Integration) -> Result<(), DomainError> {
        let group = integration.group();
        sqlx::query(
            r#"
            INSERT INTO integrations (
                id, campaign_id, campaign_slug, created_by, chat_id, group_title, group_kind,
                policy, api_key, provider_api_key, provider_bearer_token, is_active,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(integration.id().as_uuid())
        .bind(integration.campaign_id())
        .bind(integration.campaign_slug())
        .bind(integration.created_by())
        .bind(group.chat_id.value())
        .bind(&group.title)
        .bind(group.kind.as_str())
        .bind(Json(integration.policy()))
        .bind(integration.api_key().as_str())
        .bind(&integration.credentials().api_key)
        .bind(integration.credentials().bearer_token.expose_secret().as_str())
        .bind(integration.is_active())
        .bind(integration.created_at().as_datetime())
        .bind(integration.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("integrations_chat_id_key") {
                    return DomainError::new(
                        ErrorCode::GroupAlreadyBound,
                        format!("Group {} is already bound to an integration", group.chat_id),
                    );
                }
            }
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to create integration: {}", e))
        })?;

        Ok(())
    }

    async fn update(&self, integration: &Integration) -> Result<(), DomainError> {
        let group = integration.group();
        let result = sqlx::query(
            r#"
            UPDATE integrations SET
                group_title = $2,
                group_kind = $3,
                policy = $4,
                api_key = $5,
                provider_api_key = $6,
                provider_bearer_token = $7,
                is_active = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(integration.id().as_uuid())
        .bind(&group.title)
        .bind(group.kind.as_str())
        .bind(Json(integration.policy()))
        .bind(integration.api_key().as_str())
        .bind(&integration.credentials().api_key)
        .bind(integration.credentials().bearer_token.expose_secret().as_str())
        .bind(integration.is_active())
        .bind(integration.updated_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to update integration: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::IntegrationNotFound,
                format!("Integration {} not found", integration.id()),
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: IntegrationId) -> Result<Option<Integration>, DomainError> {
        let row = sqlx::query_as::<_, IntegrationRow>(&format!("{} WHERE id = $1", SELECT_INTEGRATION))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to fetch integration: {}", e)))?;

        row.map(Integration::try_from).transpose()
    }

    async fn find_by_chat(&self, chat_id: ChatId) -> Result<Option<Integration>, DomainError> {
        let row = sqlx::query_as::<_, IntegrationRow>(&format!(
            "{} WHERE chat_id = $1",
            SELECT_INTEGRATION
        ))
        .bind(chat_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch integration: {}", e)))?;

        row.map(Integration::try_from).transpose()
    }

    async fn find_active_by_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<Vec<Integration>, DomainError> {
        let rows = sqlx::query_as::<_, IntegrationRow>(&format!(
            "{} WHERE campaign_id = $1 AND is_active ORDER BY created_at",
            SELECT_INTEGRATION
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list integrations: {}", e)))?;

        rows_into(rows)
    }

    async fn list_active(&self) -> Result<Vec<Integration>, DomainError> {
        let rows = sqlx::query_as::<_, IntegrationRow>(&format!(
            "{} WHERE is_active ORDER BY created_at",
            SELECT_INTEGRATION
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list integrations: {}", e)))?;

        rows_into(rows)
    }
}
