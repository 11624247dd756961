//! In-memory session repository for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::authorization::{AuthorizationSession, SessionToken};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::SessionRepository;

#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, AuthorizationSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn save(&self, session: &AuthorizationSession) -> Result<(), DomainError> {
        self.sessions
            .write()
            .await
            .insert(session.token().as_str().to_string(), session.clone());
        Ok(())
    }

    async fn find(&self, token: &SessionToken) -> Result<Option<AuthorizationSession>, DomainError> {
        Ok(self.sessions.read().await.get(token.as_str()).cloned())
    }

    async fn delete_expired_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.expires_at().is_before(&cutoff));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::authorization::TemporaryCredentials;
    use secrecy::SecretString;

    fn session(now: Timestamp) -> AuthorizationSession {
        AuthorizationSession::start(
            "podcast-x",
            "c-1",
            "maker-1",
            "https://example.com/done",
            TemporaryCredentials {
                api_key: "key".into(),
                bearer_token: SecretString::new("bearer".into()),
            },
            now,
            30,
        )
    }

    #[tokio::test]
    async fn save_then_find_by_token() {
        let repo = InMemorySessionRepository::new();
        let s = session(Timestamp::now());
        repo.save(&s).await.unwrap();

        let found = repo.find(s.token()).await.unwrap().unwrap();
        assert_eq!(found.token(), s.token());
        assert!(repo
            .find(&SessionToken::from_string("missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn purge_only_removes_sessions_expired_before_cutoff() {
        let repo = InMemorySessionRepository::new();
        let now = Timestamp::now();
        let old = session(now.minus_days(3));
        let fresh = session(now);
        repo.save(&old).await.unwrap();
        repo.save(&fresh).await.unwrap();

        let removed = repo.delete_expired_before(now.minus_hours(24)).await.unwrap();

        assert_eq!(removed, 1);
        assert!(repo.find(fresh.token()).await.unwrap().is_some());
        assert!(repo.find(old.token()).await.unwrap().is_none());
    }
}
