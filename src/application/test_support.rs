//! Shared fixtures for application tests.
//!
//! `Harness` wires every service against the in-memory adapters with one
//! campaign (`podcast-x`, three tiers) and one bound integration gating
//! chat -100 at the silver tier. Chat `FREE_CHAT` is administered by the bot
//! but not bound, for handshake tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use secrecy::SecretString;

use crate::adapters::memory::{
    InMemoryCampaignCatalog, InMemoryCredentialStore, InMemoryGroupStore,
    InMemoryIntegrationRepository, InMemoryJobQueue, InMemoryJournal, InMemoryMembershipRepository,
    InMemorySessionRepository, InMemorySubscriptionProvider, RecordingGateway,
};
use crate::domain::authorization::IdentityVerifier;
use crate::domain::campaign::{Campaign, Tier};
use crate::domain::foundation::{ChatId, ChatUserId, MembershipId, Timestamp};
use crate::domain::groups::{ChatInfo, GroupKind, MemberPermissions};
use crate::domain::integration::{AccessPolicy, GroupBinding, Integration, ProviderCredentials};
use crate::domain::membership::{ChatIdentityLink, Email, MembershipRecord, MembershipStatus};
use crate::domain::webhook::WebhookSignatureVerifier;
use crate::ports::{CredentialExchangeStore, CredentialGrant, IntegrationRepository, MembershipRepository};

use super::reconciliation::{ReconciliationJobs, ReconciliationSettings};
use super::{
    AccessVerifier, AuthorizationSessionManager, BotUpdateHandler, GroupDiscoveryRegistry,
    IntegrationAdmin, InviteIssuer, MembershipLedger, PlatformWebhookHandler, SessionManagerDeps,
};

pub const CAMPAIGN_ID: &str = "c-1";
pub const MAKER: &str = "maker-1";
pub const BOUND_CHAT: ChatId = ChatId::new(-100);
pub const FREE_CHAT: ChatId = ChatId::new(-200);

const BOT_TOKEN: &str = "123456:test-token";
const WEBHOOK_SECRET: &str = "whsec-test";

pub fn email(raw: &str) -> Email {
    Email::parse(raw).unwrap()
}

pub fn admin_rights() -> MemberPermissions {
    MemberPermissions {
        is_administrator: true,
        can_invite_users: true,
        can_manage_chat: true,
        can_post_messages: true,
        can_restrict_members: true,
    }
}

pub fn chat_info(id: i64, kind: GroupKind) -> ChatInfo {
    ChatInfo {
        chat_id: ChatId::new(id),
        title: Some(format!("Group {}", id)),
        kind,
    }
}

pub fn tiers() -> Vec<Tier> {
    [("bronze", "Bronze", 500), ("silver", "Silver", 1500), ("gold", "Gold", 3000)]
        .into_iter()
        .map(|(id, title, amount_cents)| Tier {
            id: id.to_string(),
            title: title.to_string(),
            amount_cents,
        })
        .collect()
}

/// Active integration of `podcast-x` gating `chat` at the silver tier.
pub fn active_integration(chat: i64) -> Integration {
    Integration::new(
        CAMPAIGN_ID,
        "podcast-x",
        MAKER,
        GroupBinding {
            chat_id: ChatId::new(chat),
            title: "Backers".into(),
            kind: GroupKind::Supergroup,
        },
        AccessPolicy::MinimumTier {
            tier_id: "silver".into(),
            amount_cents: 1500,
        },
        ProviderCredentials {
            api_key: "campaign-key".into(),
            bearer_token: SecretString::new("campaign-bearer".into()),
        },
        Timestamp::now(),
    )
}

pub struct Harness {
    pub records: Arc<InMemoryMembershipRepository>,
    pub integrations: Arc<InMemoryIntegrationRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub catalog: Arc<InMemoryCampaignCatalog>,
    pub provider: Arc<InMemorySubscriptionProvider>,
    pub gateway: Arc<RecordingGateway>,
    pub journal: Arc<InMemoryJournal>,
    pub queue: Arc<InMemoryJobQueue>,

    pub verifier: Arc<AccessVerifier>,
    pub ledger: Arc<MembershipLedger>,
    pub invites: Arc<InviteIssuer>,
    pub registry: Arc<GroupDiscoveryRegistry>,
    pub handshake: Arc<AuthorizationSessionManager>,
    pub admin: Arc<IntegrationAdmin>,
    pub jobs: Arc<ReconciliationJobs>,
    pub webhooks: Arc<PlatformWebhookHandler>,
    pub bot: Arc<BotUpdateHandler>,

    /// The integration bound to `BOUND_CHAT`, as created.
    pub integration: Integration,
    seeded: AtomicI64,
}

impl Harness {
    pub async fn new() -> Self {
        let records = Arc::new(InMemoryMembershipRepository::new());
        let integrations = Arc::new(InMemoryIntegrationRepository::new());
        let sessions = Arc::new(InMemorySessionRepository::new());
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let catalog = Arc::new(InMemoryCampaignCatalog::new());
        let provider = Arc::new(InMemorySubscriptionProvider::new());
        let gateway = Arc::new(RecordingGateway::default());
        let journal = Arc::new(InMemoryJournal::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let groups = Arc::new(InMemoryGroupStore::new());

        catalog
            .add(
                Campaign {
                    id: CAMPAIGN_ID.into(),
                    slug: "podcast-x".into(),
                    title: "Podcast X".into(),
                    owner_id: MAKER.into(),
                },
                tiers(),
            )
            .await;

        credentials
            .put(
                "temp-key",
                &CredentialGrant {
                    bearer_token: SecretString::new("temp-bearer".into()),
                    campaign_slug: "podcast-x".into(),
                    maker_id: MAKER.into(),
                },
                3600,
            )
            .await
            .unwrap();

        let integration = active_integration(BOUND_CHAT.value());
        integrations.create(&integration).await.unwrap();

        gateway
            .add_chat(chat_info(BOUND_CHAT.value(), GroupKind::Supergroup), admin_rights())
            .await;
        gateway
            .add_chat(chat_info(FREE_CHAT.value(), GroupKind::Supergroup), admin_rights())
            .await;

        let verifier = Arc::new(AccessVerifier::new(
            integrations.clone(),
            catalog.clone(),
            provider.clone(),
        ));
        let ledger = Arc::new(MembershipLedger::new(
            records.clone(),
            integrations.clone(),
            gateway.clone(),
            journal.clone(),
        ));
        let invites = Arc::new(InviteIssuer::new(
            ledger.clone(),
            integrations.clone(),
            gateway.clone(),
            journal.clone(),
            24,
        ));
        let registry = Arc::new(GroupDiscoveryRegistry::new(groups, gateway.clone()));
        let handshake = Arc::new(AuthorizationSessionManager::new(
            SessionManagerDeps {
                sessions: sessions.clone(),
                credentials: credentials.clone(),
                catalog: catalog.clone(),
                registry: registry.clone(),
                integrations: integrations.clone(),
                gateway: gateway.clone(),
                journal: journal.clone(),
            },
            identity_verifier(),
            30,
        ));
        let admin = Arc::new(IntegrationAdmin::new(
            integrations.clone(),
            catalog.clone(),
            gateway.clone(),
            journal.clone(),
        ));
        let jobs = Arc::new(ReconciliationJobs::new(
            verifier.clone(),
            ledger.clone(),
            handshake.clone(),
            integrations.clone(),
            gateway.clone(),
            journal.clone(),
            queue.clone(),
            ReconciliationSettings::default(),
        ));
        let webhooks = Arc::new(PlatformWebhookHandler::new(
            webhook_verifier(),
            integrations.clone(),
            verifier.clone(),
            ledger.clone(),
            invites.clone(),
            journal.clone(),
        ));
        let bot = Arc::new(BotUpdateHandler::new(
            integrations.clone(),
            ledger.clone(),
            verifier.clone(),
            invites.clone(),
            registry.clone(),
            gateway.clone(),
            journal.clone(),
        ));

        Self {
            records,
            integrations,
            sessions,
            credentials,
            catalog,
            provider,
            gateway,
            journal,
            queue,
            verifier,
            ledger,
            invites,
            registry,
            handshake,
            admin,
            jobs,
            webhooks,
            bot,
            integration,
            seeded: AtomicI64::new(0),
        }
    }

    pub fn identity_verifier(&self) -> IdentityVerifier {
        identity_verifier()
    }

    pub fn webhook_signature(&self, body: &[u8]) -> String {
        webhook_verifier().sign(body)
    }

    /// An active member of the bound integration, linked to `user_id`.
    pub async fn seed_active(&self, addr: &str, user_id: i64) -> MembershipRecord {
        self.seed(addr, user_id, MembershipStatus::Active, Timestamp::now(), None)
            .await
    }

    /// An overdue member whose last payment check was `days_ago` days ago,
    /// already sent the grace notice when `warned`.
    pub async fn seed_overdue(
        &self,
        addr: &str,
        user_id: i64,
        days_ago: i64,
        warned: bool,
    ) -> MembershipRecord {
        let checked = Timestamp::now().minus_days(days_ago);
        self.seed(
            addr,
            user_id,
            MembershipStatus::PaymentOverdue,
            checked,
            warned.then_some(checked),
        )
        .await
    }

    async fn seed(
        &self,
        addr: &str,
        user_id: i64,
        status: MembershipStatus,
        checked: Timestamp,
        warned_at: Option<Timestamp>,
    ) -> MembershipRecord {
        let created = self.next_seed_time();
        let record = MembershipRecord::reconstitute(
            MembershipId::new(),
            self.integration.id(),
            email(addr),
            None,
            Some(ChatIdentityLink {
                user_id: ChatUserId::new(user_id),
                handle: None,
            }),
            status,
            Some(created),
            Some(created),
            Some(checked),
            warned_at,
            None,
            None,
            None,
            created,
            created,
        );
        assert!(self.records.insert(&record).await.unwrap());
        record
    }

    /// Strictly increasing creation times, so "oldest first" is the seed order.
    fn next_seed_time(&self) -> Timestamp {
        let n = self.seeded.fetch_add(1, Ordering::SeqCst);
        Timestamp::now().minus_days(30).plus_secs(n)
    }
}

fn identity_verifier() -> IdentityVerifier {
    IdentityVerifier::new(&SecretString::new(BOT_TOKEN.into()), 300)
}

fn webhook_verifier() -> WebhookSignatureVerifier {
    WebhookSignatureVerifier::new(SecretString::new(WEBHOOK_SECRET.into()))
}
