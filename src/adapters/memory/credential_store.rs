//! In-memory credential exchange store with expiry.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{CredentialExchangeStore, CredentialGrant};

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    grants: RwLock<HashMap<String, (CredentialGrant, Timestamp)>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a grant, as if its TTL had run out.
    pub async fn expire(&self, api_key: &str) {
        self.grants.write().await.remove(api_key);
    }
}

#[async_trait]
impl CredentialExchangeStore for InMemoryCredentialStore {
    async fn get(&self, api_key: &str) -> Result<Option<CredentialGrant>, DomainError> {
        let now = Timestamp::now();
        Ok(self
            .grants
            .read()
            .await
            .get(api_key)
            .filter(|(_, expires_at)| now.is_before(expires_at))
            .map(|(grant, _)| grant.clone()))
    }

    async fn put(
        &self,
        api_key: &str,
        grant: &CredentialGrant,
        ttl_secs: u64,
    ) -> Result<(), DomainError> {
        let expires_at = Timestamp::now().plus_secs(ttl_secs as i64);
        self.grants
            .write()
            .await
            .insert(api_key.to_string(), (grant.clone(), expires_at));
        Ok(())
    }
}
