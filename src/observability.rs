//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over `server.log_level` when set. Production defaults to
//! JSON lines; everything else to the human-readable formatter.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, ServerConfig};

pub fn env_filter(config: &ServerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init(config: &ServerConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    match config.effective_log_format() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
    }
}
