//! Redis implementation of ScheduleLedger.
//!
//! A fire time is claimed with `SET key 1 NX EX ttl`. Only the first instance
//! to set the key enqueues the job; the key expires long after any instance
//! could still be catching up on that fire time.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::ScheduleLedger;

use super::cache_error;

#[derive(Clone)]
pub struct RedisScheduleLedger {
    conn: MultiplexedConnection,
    namespace: String,
}

impl RedisScheduleLedger {
    pub fn new(conn: MultiplexedConnection, namespace: &str) -> Self {
        Self {
            conn,
            namespace: namespace.to_string(),
        }
    }

    fn key_for(&self, schedule: &str, fire_at: Timestamp) -> String {
        format!(
            "{}:schedule:{}:{}",
            self.namespace,
            schedule,
            fire_at.as_unix_secs()
        )
    }
}

#[async_trait]
impl ScheduleLedger for RedisScheduleLedger {
    async fn claim(
        &self,
        schedule: &str,
        fire_at: Timestamp,
        ttl_secs: u64,
    ) -> Result<bool, DomainError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key_for(schedule, fire_at))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut conn)
            .await
            .map_err(cache_error("claim schedule"))?;

        Ok(reply.is_some())
    }

    async fn release(&self, schedule: &str, fire_at: Timestamp) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(self.key_for(schedule, fire_at))
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(cache_error("release schedule claim"))?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisScheduleLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisScheduleLedger")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
