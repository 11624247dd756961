//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SessionRepository` - Handshake sessions keyed by token
//! - `IntegrationRepository` - Campaign ↔ group bindings
//! - `MembershipRepository` - Per-supporter records
//! - `DiscoveredGroupStore` - Groups the bot administers
//! - `EventJournal` - Append-only audit log
//!
//! ## External Service Ports
//!
//! - `MessagingGateway` - Chat transport
//! - `SubscriptionProvider` - Supporter entitlement source
//! - `CampaignCatalog` - Campaigns and reward tiers
//! - `CredentialExchangeStore` - Temporary connect-flow credentials
//!
//! ## Scheduling Infrastructure Ports
//!
//! - `JobQueue` - Durable reconciliation work queue
//! - `ScheduleLedger` - At-most-once cron fire claims
//! - `RateLimiter` - Provider quota counters

mod campaign_catalog;
mod credential_store;
mod discovered_group_store;
mod event_journal;
mod integration_repository;
mod job_queue;
mod membership_repository;
mod messaging_gateway;
mod rate_limiter;
mod schedule_ledger;
mod session_repository;
mod subscription_provider;

pub use campaign_catalog::CampaignCatalog;
pub use credential_store::{CredentialExchangeStore, CredentialGrant};
pub use discovered_group_store::DiscoveredGroupStore;
pub use event_journal::EventJournal;
pub use integration_repository::IntegrationRepository;
pub use job_queue::{Delivery, FailedJob, Job, JobQueue, QueuedJob};
pub use membership_repository::MembershipRepository;
pub use messaging_gateway::{GatewayError, MessagingGateway};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus,
    RateLimitWindow, RateLimiter,
};
pub use schedule_ledger::ScheduleLedger;
pub use session_repository::SessionRepository;
pub use subscription_provider::{ChargeStatus, ProviderError, SubscriptionProvider};
