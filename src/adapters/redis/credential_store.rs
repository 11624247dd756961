//! Redis implementation of CredentialExchangeStore.
//!
//! The marketplace writes `integration:credentials:{apiKey}` when a maker
//! starts the connect flow. The value is a camelCase JSON object; fields this
//! service does not use (`campaignId`, `createdAt`) are ignored.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{CredentialExchangeStore, CredentialGrant};

use super::cache_error;

const KEY_PREFIX: &str = "integration:credentials:";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredGrant {
    bearer_token: String,
    campaign_slug: String,
    maker_id: String,
}

#[derive(Clone)]
pub struct RedisCredentialStore {
    conn: MultiplexedConnection,
}

impl RedisCredentialStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn key_for(api_key: &str) -> String {
    format!("{}{}", KEY_PREFIX, api_key)
}

#[async_trait]
impl CredentialExchangeStore for RedisCredentialStore {
    async fn get(&self, api_key: &str) -> Result<Option<CredentialGrant>, DomainError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(key_for(api_key))
            .query_async(&mut conn)
            .await
            .map_err(cache_error("read credentials"))?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let stored: StoredGrant = serde_json::from_str(&raw).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Malformed credential entry: {}", e),
            )
        })?;

        Ok(Some(CredentialGrant {
            bearer_token: SecretString::new(stored.bearer_token),
            campaign_slug: stored.campaign_slug,
            maker_id: stored.maker_id,
        }))
    }

    async fn put(
        &self,
        api_key: &str,
        grant: &CredentialGrant,
        ttl_secs: u64,
    ) -> Result<(), DomainError> {
        let value = serde_json::to_string(&StoredGrant {
            bearer_token: grant.bearer_token.expose_secret().clone(),
            campaign_slug: grant.campaign_slug.clone(),
            maker_id: grant.maker_id.clone(),
        })
        .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key_for(api_key))
            .arg(value)
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_error("store credentials"))
    }
}

impl std::fmt::Debug for RedisCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCredentialStore").finish_non_exhaustive()
    }
}
