//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresCampaignCatalog` - read-only view of marketplace campaigns
//! - `PostgresIntegrationRepository` - campaign ↔ group bindings
//! - `PostgresMembershipRepository` - per-supporter records
//! - `PostgresSessionRepository` - handshake sessions
//! - `PostgresGroupStore` - groups the bot administers
//! - `PostgresEventJournal` - append-only audit log
//!
//! Schema lives in `migrations/` and is applied by [`connect`] when
//! `database.run_migrations` is set.

mod campaign_catalog;
mod group_store;
mod integration_repository;
mod journal;
mod membership_repository;
mod session_repository;

pub use campaign_catalog::PostgresCampaignCatalog;
pub use group_store::PostgresGroupStore;
pub use integration_repository::PostgresIntegrationRepository;
pub use journal::PostgresEventJournal;
pub use membership_repository::PostgresMembershipRepository;
pub use session_repository::PostgresSessionRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Opens the connection pool and, when configured, applies pending migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(Some(config.idle_timeout()))
        .max_lifetime(Some(config.max_lifetime()))
        .connect(&config.url)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}
