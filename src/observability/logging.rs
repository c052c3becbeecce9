//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (pretty or JSON)
//! - Route breaker messages at each key's configured severity
//!
//! # Design Decisions
//! - RUST_LOG wins over the configured level
//! - Breaker messages carry a `breaker_key` field for filtering

use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;
use crate::config::settings::SettingsProvider;

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("durable_breaker={},tower_http=info", config.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Destination for breaker messages.
pub trait LogSink: Send + Sync {
    fn log(&self, key: &str, level: Level, message: &str);
}

/// Emits breaker messages as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, key: &str, level: Level, message: &str) {
        match level {
            Level::TRACE => tracing::trace!(breaker_key = %key, "{}", message),
            Level::DEBUG => tracing::debug!(breaker_key = %key, "{}", message),
            Level::INFO => tracing::info!(breaker_key = %key, "{}", message),
            Level::WARN => tracing::warn!(breaker_key = %key, "{}", message),
            _ => tracing::error!(breaker_key = %key, "{}", message),
        }
    }
}

/// Logs breaker messages at the severity configured for each key.
#[derive(Clone)]
pub struct BreakerLogger {
    sink: Arc<dyn LogSink>,
    settings: Arc<SettingsProvider>,
}

impl BreakerLogger {
    pub fn new(sink: Arc<dyn LogSink>, settings: Arc<SettingsProvider>) -> Self {
        Self { sink, settings }
    }

    /// Logger that writes to tracing.
    pub fn tracing(settings: Arc<SettingsProvider>) -> Self {
        Self::new(Arc::new(TracingSink), settings)
    }

    pub fn log(&self, key: &str, message: impl AsRef<str>) {
        if let Some(level) = self.settings.log_level(key) {
            self.sink.log(key, level, message.as_ref());
        }
    }
}

impl std::fmt::Debug for BreakerLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerLogger").finish_non_exhaustive()
    }
}
