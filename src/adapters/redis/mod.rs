//! Redis adapters.
//!
//! - `RedisCredentialStore` - temporary handshake credentials written by the
//!   marketplace, one key per api key with a TTL
//! - `RedisJobQueue` - durable reconciliation queue on three lists
//! - `RedisScheduleLedger` - `SET NX EX` claims on cron fire times
//!
//! All of them share one multiplexed connection, cloned per call.

mod credential_store;
mod job_queue;
mod schedule_ledger;

pub use credential_store::RedisCredentialStore;
pub use job_queue::RedisJobQueue;
pub use schedule_ledger::RedisScheduleLedger;

use redis::aio::MultiplexedConnection;

use crate::config::RedisConfig;
use crate::domain::foundation::DomainError;

/// Opens the shared connection, giving up after `redis.timeout_secs`.
pub async fn connect(config: &RedisConfig) -> Result<MultiplexedConnection, DomainError> {
    let client = redis::Client::open(config.url.as_str())
        .map_err(|e| DomainError::cache(format!("Invalid Redis URL: {}", e)))?;

    tokio::time::timeout(config.timeout(), client.get_multiplexed_tokio_connection())
        .await
        .map_err(|_| DomainError::cache("Timed out connecting to Redis"))?
        .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))
}

pub(crate) fn cache_error(action: &str) -> impl FnOnce(redis::RedisError) -> DomainError + '_ {
    move |e| DomainError::cache(format!("Failed to {}: {}", action, e))
}
