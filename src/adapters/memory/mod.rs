//! In-memory adapters.
//!
//! One implementation per port, for tests and for running the service
//! without Postgres or Redis. State lives behind tokio locks and is lost on
//! restart.

mod campaign_catalog;
mod credential_store;
mod group_store;
mod integration_repository;
mod job_queue;
mod journal;
mod membership_repository;
mod recording_gateway;
mod schedule_ledger;
mod session_repository;
mod subscription_provider;

pub use campaign_catalog::InMemoryCampaignCatalog;
pub use credential_store::InMemoryCredentialStore;
pub use group_store::InMemoryGroupStore;
pub use integration_repository::InMemoryIntegrationRepository;
pub use job_queue::InMemoryJobQueue;
pub use journal::InMemoryJournal;
pub use membership_repository::InMemoryMembershipRepository;
pub use recording_gateway::{FailingOp, GatewayCall, RecordingGateway};
pub use schedule_ledger::InMemoryScheduleLedger;
pub use session_repository::InMemorySessionRepository;
pub use subscription_provider::InMemorySubscriptionProvider;
