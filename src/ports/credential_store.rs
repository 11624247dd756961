//! Temporary credential exchange store.
//!
//! When a maker starts the connect flow, the marketplace stores an
//! api-key/bearer-token pair here for about an hour. The handshake reads it
//! twice: once to open the session and once more right before creating the
//! integration, so a lapsed grant blocks completion.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::foundation::DomainError;

/// What the marketplace stored under an api key.
#[derive(Debug, Clone)]
pub struct CredentialGrant {
    pub bearer_token: SecretString,
    pub campaign_slug: String,
    pub maker_id: String,
}

#[async_trait]
pub trait CredentialExchangeStore: Send + Sync {
    /// The live grant stored under `api_key`, if it has not expired.
    async fn get(&self, api_key: &str) -> Result<Option<CredentialGrant>, DomainError>;

    /// Store a grant for `ttl_secs` seconds.
    async fn put(
        &self,
        api_key: &str,
        grant: &CredentialGrant,
        ttl_secs: u64,
    ) -> Result<(), DomainError>;
}
