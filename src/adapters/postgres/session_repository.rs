//! PostgreSQL implementation of SessionRepository.
//!
//! Handshake progress (identity, group, tier) is stored as JSONB, each column
//! null until its step has run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::authorization::{
    AuthorizationSession, ChatIdentity, SelectedGroup, SessionStatus, SessionToken,
    TemporaryCredentials,
};
use crate::domain::campaign::Tier;
use crate::domain::foundation::{DomainError, ErrorCode, IntegrationId, Timestamp};
use crate::ports::SessionRepository;

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    token: String,
    campaign_slug: String,
    campaign_id: String,
    maker_id: String,
    redirect_uri: String,
    api_key: String,
    bearer_token: String,
    identity: Option<Json<ChatIdentity>>,
    selected_group: Option<Json<SelectedGroup>>,
    selected_tier: Option<Json<Tier>>,
    status: String,
    error_message: Option<String>,
    integration_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for AuthorizationSession {
    type Error = DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status: SessionStatus = row.status.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid session status: {}", e))
        })?;

        Ok(AuthorizationSession::reconstitute(
            SessionToken::from_string(row.token),
            row.campaign_slug,
            row.campaign_id,
            row.maker_id,
            row.redirect_uri,
            TemporaryCredentials {
                api_key: row.api_key,
                bearer_token: SecretString::new(row.bearer_token),
            },
            row.identity.map(|j| j.0),
            row.selected_group.map(|j| j.0),
            row.selected_tier.map(|j| j.0),
            status,
            row.error_message,
            row.integration_id.map(IntegrationId::from_uuid),
            Timestamp::from_datetime(row.created_at),
            Timestamp::from_datetime(row.updated_at),
            Timestamp::from_datetime(row.expires_at),
        ))
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn save(&self, session: &AuthorizationSession) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO authorization_sessions (
                token, campaign_slug, campaign_id, maker_id, redirect_uri, api_key,
                bearer_token, identity, selected_group, selected_tier, status,
                error_message, integration_id, created_at, updated_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (token) DO UPDATE SET
                identity = EXCLUDED.identity,
                selected_group = EXCLUDED.selected_group,
                selected_tier = EXCLUDED.selected_tier,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                integration_id = EXCLUDED.integration_id,
                updated_at = EXCLUDED.updated_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.token().as_str())
        .bind(session.campaign_slug())
        .bind(session.campaign_id())
        .bind(session.maker_id())
        .bind(session.redirect_uri())
        .bind(&session.credentials().api_key)
        .bind(session.credentials().bearer_token.expose_secret().as_str())
        .bind(session.identity().map(Json))
        .bind(session.group().map(Json))
        .bind(session.tier().map(Json))
        .bind(session.status().as_str())
        .bind(session.error_message())
        .bind(session.integration_id().map(|id| *id.as_uuid()))
        .bind(session.created_at().as_datetime())
        .bind(session.updated_at().as_datetime())
        .bind(session.expires_at().as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save session: {}", e))
        })?;

        Ok(())
    }

    async fn find(&self, token: &SessionToken) -> Result<Option<AuthorizationSession>, DomainError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT token, campaign_slug, campaign_id, maker_id, redirect_uri, api_key,
                   bearer_token, identity, selected_group, selected_tier, status,
                   error_message, integration_id, created_at, updated_at, expires_at
            FROM authorization_sessions
            WHERE token = $1
            "#,
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to fetch session: {}", e)))?;

        row.map(AuthorizationSession::try_from).transpose()
    }

    async fn delete_expired_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM authorization_sessions WHERE expires_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to purge sessions: {}", e)))?;

        Ok(result.rows_affected())
    }
}
