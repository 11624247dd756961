//! Shared state handed to every route.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::mpsc;

use crate::application::{
    AuthorizationSessionManager, GroupDiscoveryRegistry, IntegrationAdmin, PlatformWebhookHandler,
};
use crate::domain::chat::InboundUpdate;
use crate::ports::IntegrationRepository;

/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub handshake: Arc<AuthorizationSessionManager>,
    pub registry: Arc<GroupDiscoveryRegistry>,
    pub webhooks: Arc<PlatformWebhookHandler>,
    pub admin: Arc<IntegrationAdmin>,
    pub integrations: Arc<dyn IntegrationRepository>,
    /// Where pushed Telegram updates go; the same channel the poller feeds.
    pub updates: mpsc::Sender<InboundUpdate>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`. `None` disables the
    /// Telegram webhook route.
    pub telegram_secret: Option<Arc<SecretString>>,
}
