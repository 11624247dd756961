//! Service stack over the in-memory adapters, shared by the integration
//! tests. One campaign (`podcast-x`) with bronze, silver and gold tiers; the
//! bot administers `GATED_CHAT` and `SPARE_CHAT`.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::SecretString;

use supporter_gate::adapters::memory::{
    InMemoryCampaignCatalog, InMemoryCredentialStore, InMemoryGroupStore,
    InMemoryIntegrationRepository, InMemoryJobQueue, InMemoryJournal, InMemoryMembershipRepository,
    InMemorySessionRepository, InMemorySubscriptionProvider, RecordingGateway,
};
use supporter_gate::application::reconciliation::{ReconciliationJobs, ReconciliationSettings};
use supporter_gate::application::{
    AccessVerifier, AuthorizationSessionManager, BotUpdateHandler, GroupDiscoveryRegistry,
    IntegrationAdmin, InviteIssuer, MembershipLedger, PlatformWebhookHandler, SessionManagerDeps,
};
use supporter_gate::domain::authorization::{IdentityProof, IdentityVerifier, SessionToken};
use supporter_gate::domain::campaign::{Campaign, Tier};
use supporter_gate::domain::chat::{ChatRef, ChatUser, InboundUpdate};
use supporter_gate::domain::foundation::{ChatId, ChatUserId, MembershipId, Timestamp};
use supporter_gate::domain::groups::{ChatInfo, GroupKind, MemberPermissions};
use supporter_gate::domain::integration::Integration;
use supporter_gate::domain::membership::{ChatIdentityLink, Email, MembershipRecord, MembershipStatus};
use supporter_gate::domain::webhook::WebhookSignatureVerifier;
use supporter_gate::ports::{CredentialExchangeStore, CredentialGrant, MembershipRepository};

pub const CAMPAIGN_ID: &str = "c-1";
pub const MAKER: &str = "maker-1";
pub const GATED_CHAT: ChatId = ChatId::new(-1001);
pub const SPARE_CHAT: ChatId = ChatId::new(-1002);

const BOT_TOKEN: &str = "123456:integration";
const WEBHOOK_SECRET: &str = "whsec-integration";

pub struct Stack {
    pub records: Arc<InMemoryMembershipRepository>,
    pub integrations: Arc<InMemoryIntegrationRepository>,
    pub provider: Arc<InMemorySubscriptionProvider>,
    pub gateway: Arc<RecordingGateway>,
    pub journal: Arc<InMemoryJournal>,
    pub queue: Arc<InMemoryJobQueue>,

    pub handshake: Arc<AuthorizationSessionManager>,
    pub registry: Arc<GroupDiscoveryRegistry>,
    pub admin: Arc<IntegrationAdmin>,
    pub webhooks: Arc<PlatformWebhookHandler>,
    pub bot: Arc<BotUpdateHandler>,
    pub jobs: Arc<ReconciliationJobs>,
}

fn admin_rights() -> MemberPermissions {
    MemberPermissions {
        is_administrator: true,
        can_invite_users: true,
        can_manage_chat: true,
        can_post_messages: true,
        can_restrict_members: true,
    }
}

impl Stack {
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
                vec![tier("bronze", 500), tier("silver", 1500), tier("gold", 3000)],
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
        for chat in [GATED_CHAT, SPARE_CHAT] {
            gateway
                .add_chat(
                    ChatInfo {
                        chat_id: chat,
                        title: Some(format!("Backers {}", chat)),
                        kind: GroupKind::Supergroup,
                    },
                    admin_rights(),
                )
                .await;
        }

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
                sessions,
                credentials,
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
            catalog,
            gateway.clone(),
            journal.clone(),
        ));
        let webhooks = Arc::new(PlatformWebhookHandler::new(
            WebhookSignatureVerifier::new(SecretString::new(WEBHOOK_SECRET.into())),
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
            invites,
            registry.clone(),
            gateway.clone(),
            journal.clone(),
        ));
        let jobs = Arc::new(ReconciliationJobs::new(
            verifier,
            ledger,
            handshake.clone(),
            integrations.clone(),
            gateway.clone(),
            journal.clone(),
            queue.clone(),
            ReconciliationSettings::default(),
        ));

        Self {
            records,
            integrations,
            provider,
            gateway,
            journal,
            queue,
            handshake,
            registry,
            admin,
            webhooks,
            bot,
            jobs,
        }
    }

    pub fn sign_webhook(&self, body: &[u8]) -> String {
        WebhookSignatureVerifier::new(SecretString::new(WEBHOOK_SECRET.into())).sign(body)
    }

    /// A fresh login-widget proof for `user_id`.
    pub fn login_proof(&self, user_id: i64) -> IdentityProof {
        self.login_proof_aged(user_id, 0)
    }

    /// A login-widget proof signed `age_secs` ago.
    pub fn login_proof_aged(&self, user_id: i64, age_secs: i64) -> IdentityProof {
        let auth_date = Timestamp::now().minus_secs(age_secs).as_unix_secs();
        let fields: BTreeMap<String, String> = [
            ("id", user_id.to_string()),
            ("first_name", "Maker".to_string()),
            ("auth_date", auth_date.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        identity_verifier().sign(fields).unwrap()
    }

    /// A pending session started with the seeded temporary credentials.
    pub async fn start_session(&self) -> SessionToken {
        self.handshake
            .initiate(
                "podcast-x",
                "temp-key",
                SecretString::new("temp-bearer".into()),
                "https://maker.example/done",
            )
            .await
            .unwrap()
            .token()
            .clone()
    }

    /// Runs a session up to `tier_selected` for `chat` at the silver tier.
    pub async fn session_for(&self, chat: ChatId) -> SessionToken {
        let token = self.start_session().await;
        self.handshake
            .confirm_identity(&token, &self.login_proof(99))
            .await
            .unwrap();
        self.handshake.select_group(&token, chat, "Backers").await.unwrap();
        self.handshake
            .select_tier(&token, Some("silver"))
            .await
            .unwrap();
        token
    }

    /// Full handshake binding `chat` at the silver tier.
    pub async fn connect_group(&self, chat: ChatId) -> Integration {
        let token = self.session_for(chat).await;
        let (_, integration) = self.handshake.complete(&token).await.unwrap();
        integration
    }

    /// Stores a linked member directly, bypassing the invite flow.
    pub async fn seed_member(
        &self,
        integration: &Integration,
        addr: &str,
        user_id: i64,
        status: MembershipStatus,
        last_payment_check: Timestamp,
    ) -> MembershipRecord {
        let created = Timestamp::now().minus_days(30);
        let record = MembershipRecord::reconstitute(
            MembershipId::new(),
            integration.id(),
            Email::parse(addr).unwrap(),
            None,
            Some(ChatIdentityLink {
                user_id: ChatUserId::new(user_id),
                handle: None,
            }),
            status,
            Some(created),
            Some(created),
            Some(last_payment_check),
            None,
            None,
            None,
            None,
            created,
            created,
        );
        assert!(self.records.insert(&record).await.unwrap());
        record
    }

    pub async fn record(&self, id: MembershipId) -> MembershipRecord {
        self.records.find_by_id(id).await.unwrap().unwrap()
    }
}

pub fn tier(id: &str, amount_cents: i64) -> Tier {
    Tier {
        id: id.to_string(),
        title: id.to_string(),
        amount_cents,
    }
}

pub fn private_message(user_id: i64, text: &str) -> InboundUpdate {
    let user = ChatUser {
        id: ChatUserId::new(user_id),
        is_bot: false,
        first_name: "Fan".into(),
        username: Some(format!("fan{}", user_id)),
    };
    InboundUpdate::from_message(
        ChatRef {
            id: ChatId::new(user_id),
            kind: GroupKind::Private,
            title: None,
        },
        user,
        text,
    )
}

fn identity_verifier() -> IdentityVerifier {
    IdentityVerifier::new(&SecretString::new(BOT_TOKEN.into()), 300)
}
