//! Supporter Gate service binary.
//!
//! One process runs the HTTP surface, the bot update consumer, the cron
//! scheduler and the queue workers. Every task watches the same shutdown
//! channel; Ctrl-C flips it and the process waits for each task to return.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use supporter_gate::adapters::http::{app_router, AppState};
use supporter_gate::adapters::postgres::{
    self, PostgresCampaignCatalog, PostgresEventJournal, PostgresGroupStore,
    PostgresIntegrationRepository, PostgresMembershipRepository, PostgresSessionRepository,
};
use supporter_gate::adapters::rate_limiter::{
    ProviderRateLimits, RedisRateLimiter, ThrottledSubscriptionProvider,
};
use supporter_gate::adapters::redis::{
    self as redis_adapters, RedisCredentialStore, RedisJobQueue, RedisScheduleLedger,
};
use supporter_gate::adapters::subscription_api::{HttpSubscriptionConfig, HttpSubscriptionProvider};
use supporter_gate::adapters::telegram::{
    build_bot, prepare_webhook, run_consumer, run_polling, TelegramGateway,
};
use supporter_gate::application::reconciliation::{
    self, CronTrigger, ReconciliationJobs, ReconciliationScheduler, ReconciliationSettings,
    ReconciliationWorker, WorkerConfig,
};
use supporter_gate::application::{
    AccessVerifier, AuthorizationSessionManager, BotUpdateHandler, GroupDiscoveryRegistry,
    IntegrationAdmin, InviteIssuer, MembershipLedger, PlatformWebhookHandler, SessionManagerDeps,
};
use supporter_gate::config::{AppConfig, UpdateMode};
use supporter_gate::domain::authorization::IdentityVerifier;
use supporter_gate::domain::webhook::WebhookSignatureVerifier;
use supporter_gate::observability;
use supporter_gate::ports::{
    EventJournal, IntegrationRepository, Job, JobQueue, MessagingGateway, ScheduleLedger,
    SubscriptionProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;
    observability::init(&config.server);

    tracing::info!(
        environment = ?config.server.environment,
        mode = ?config.telegram.mode,
        "Starting supporter-gate"
    );

    let pool = postgres::connect(&config.database).await?;
    let redis = redis_adapters::connect(&config.redis).await?;
    let namespace = config.redis.namespace.as_str();

    // Ports
    let integrations: Arc<dyn IntegrationRepository> =
        Arc::new(PostgresIntegrationRepository::new(pool.clone()));
    let records = Arc::new(PostgresMembershipRepository::new(pool.clone()));
    let sessions = Arc::new(PostgresSessionRepository::new(pool.clone()));
    let catalog = Arc::new(PostgresCampaignCatalog::new(pool.clone()));
    let groups = Arc::new(PostgresGroupStore::new(pool.clone()));
    let journal: Arc<dyn EventJournal> = Arc::new(PostgresEventJournal::new(pool));

    let credentials = Arc::new(RedisCredentialStore::new(redis.clone()));
    let queue: Arc<dyn JobQueue> = Arc::new(RedisJobQueue::new(redis.clone(), namespace));
    let schedule: Arc<dyn ScheduleLedger> =
        Arc::new(RedisScheduleLedger::new(redis.clone(), namespace));
    let limiter = Arc::new(RedisRateLimiter::new(
        redis,
        ProviderRateLimits {
            requests_per_second: config.provider.requests_per_second,
            requests_per_month: config.provider.requests_per_month,
        },
    ));

    let provider: Arc<dyn SubscriptionProvider> = Arc::new(ThrottledSubscriptionProvider::new(
        Arc::new(HttpSubscriptionProvider::new(
            HttpSubscriptionConfig::new(&config.provider.base_url)
                .with_timeout(config.provider.timeout()),
        )),
        limiter,
        config.provider.throttle_attempts,
    ));

    let bot = build_bot(&config.telegram)?;
    prepare_webhook(&bot, &config.telegram).await?;
    let gateway: Arc<dyn MessagingGateway> = Arc::new(TelegramGateway::new(bot.clone()));

    // Services
    let membership = &config.membership;
    let verifier = Arc::new(AccessVerifier::new(
        integrations.clone(),
        catalog.clone(),
        provider,
    ));
    let ledger = Arc::new(MembershipLedger::new(
        records,
        integrations.clone(),
        gateway.clone(),
        journal.clone(),
    ));
    let invites = Arc::new(InviteIssuer::new(
        ledger.clone(),
        integrations.clone(),
        gateway.clone(),
        journal.clone(),
        membership.invite_ttl_hours,
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
        IdentityVerifier::new(&config.telegram.bot_token, membership.proof_max_age_secs),
        membership.session_ttl_minutes,
    ));
    let admin = Arc::new(IntegrationAdmin::new(
        integrations.clone(),
        catalog,
        gateway.clone(),
        journal.clone(),
    ));
    let webhooks = Arc::new(PlatformWebhookHandler::new(
        WebhookSignatureVerifier::new(config.provider.webhook_secret.clone()),
        integrations.clone(),
        verifier.clone(),
        ledger.clone(),
        invites.clone(),
        journal.clone(),
    ));
    let bot_handler = Arc::new(BotUpdateHandler::new(
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
        gateway,
        journal,
        queue.clone(),
        ReconciliationSettings {
            removal_tolerance_days: membership.removal_tolerance_days,
            warning_grace_hours: membership.warning_grace_hours,
            session_retention_hours: membership.session_retention_hours,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (updates_tx, updates_rx) = mpsc::channel(config.telegram.update_buffer);
    let mut tasks = JoinSet::new();

    // HTTP
    let telegram_secret = match config.telegram.mode {
        UpdateMode::Webhook => config
            .telegram
            .webhook_secret
            .clone()
            .map(Arc::new),
        UpdateMode::Polling => None,
    };
    let state = AppState {
        handshake,
        registry,
        webhooks,
        admin,
        integrations,
        updates: updates_tx.clone(),
        telegram_secret,
    };
    let app = app_router(state, config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");
    {
        let mut shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "HTTP server failed");
            }
        });
    }

    // Bot updates
    tasks.spawn(run_consumer(updates_rx, bot_handler, shutdown_rx.clone()));
    if config.telegram.mode == UpdateMode::Polling {
        tasks.spawn(run_polling(
            bot,
            config.telegram.polling_timeout_secs,
            updates_tx,
            shutdown_rx.clone(),
        ));
    } else {
        drop(updates_tx);
    }

    // Scheduler
    let triggers = vec![
        CronTrigger::new("sync_all", &config.scheduler.sync_cron, Job::SyncAll)?,
        CronTrigger::new("removal_sweep", &config.scheduler.removal_cron, Job::RemovalSweep)?,
        CronTrigger::new("purge_sessions", &config.scheduler.purge_cron, Job::PurgeSessions)?,
    ];
    let scheduler = ReconciliationScheduler::new(
        schedule,
        queue.clone(),
        triggers,
        reconciliation::SchedulerConfig {
            tick_interval: config.scheduler.tick_interval(),
            catch_up: config.scheduler.catch_up(),
            ..Default::default()
        },
    );
    {
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            if let Err(err) = scheduler.run(shutdown).await {
                tracing::error!(error = %err, "Scheduler stopped with an error");
            }
        });
    }

    // Workers
    let worker_config = WorkerConfig::default().with_poll_interval(config.scheduler.poll_interval());
    for n in 0..config.scheduler.worker_count {
        let worker = ReconciliationWorker::new(
            queue.clone(),
            jobs.clone(),
            worker_config.clone(),
            format!("worker-{}", n),
        );
        if n == 0 {
            worker.recover_stale().await?;
        }
        let shutdown = shutdown_rx.clone();
        tasks.spawn(async move {
            if let Err(err) = worker.run(shutdown).await {
                tracing::error!(error = %err, "Worker stopped with an error");
            }
        });
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            tracing::error!(error = %err, "Task panicked during shutdown");
        }
    }

    tracing::info!("Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Received shutdown signal");
}
