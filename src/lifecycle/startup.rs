//! Startup orchestration.
//!
//! # Order
//! ```text
//! load config → logging → metrics → settings → store (+ snapshots)
//!     → decider → watcher → listener → serve
//! ```
//! Shutdown runs the other way: stop serving, cancel pending checks,
//! terminate outstanding work, persist snapshots.

use arc_swap::ArcSwap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admission::{AdmissionDecider, BreakerGuard};
use crate::clock::{Clock, SystemClock};
use crate::config::watcher::ConfigWatcher;
use crate::config::{
    load_config, ConfigError, ConfigSource, EnvConfigSource, FileConfigSource, LayeredConfigSource, ServiceConfig,
    SettingsProvider,
};
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics, BreakerLogger};
use crate::store::persistence::{load_snapshots, save_snapshots};
use crate::store::{ActorRegistry, StoreOptions};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),
}

/// The wired-up breaker services.
pub struct Services {
    pub config: Arc<ArcSwap<ServiceConfig>>,
    pub settings: Arc<SettingsProvider>,
    pub store: ActorRegistry,
    pub decider: Arc<AdmissionDecider>,
}

impl Services {
    /// Environment overrides layered over the service file.
    pub fn assemble(config: ServiceConfig, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(ArcSwap::from_pointee(config));
        let source = LayeredConfigSource::new()
            .layer(Arc::new(EnvConfigSource))
            .layer(Arc::new(FileConfigSource::new(config.clone())));
        Self::with_source(config, Arc::new(source), clock)
    }

    pub fn with_source(
        config: Arc<ArcSwap<ServiceConfig>>,
        source: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = Arc::new(SettingsProvider::new(source));
        let logger = BreakerLogger::tracing(settings.clone());
        let options = StoreOptions::from(&config.load().store);
        let store = ActorRegistry::new(settings.clone(), clock.clone(), logger.clone(), options);
        let decider = Arc::new(AdmissionDecider::new(
            Arc::new(store.clone()),
            settings.clone(),
            clock,
            logger,
        ));

        Self {
            config,
            settings,
            store,
            decider,
        }
    }

    pub fn guard(&self) -> BreakerGuard {
        BreakerGuard::new(self.decider.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            decider: self.decider.clone(),
            config: self.config.clone(),
        }
    }

    /// Seed the store from `store.snapshot_path`, if set.
    pub fn restore_snapshots(&self) -> std::io::Result<usize> {
        let Some(path) = self.snapshot_path() else {
            return Ok(0);
        };
        let snapshots = load_snapshots(&path)?;
        let count = snapshots.len();
        self.store.restore(snapshots);
        Ok(count)
    }

    /// Write every snapshot to `store.snapshot_path`, if set.
    pub fn persist_snapshots(&self) -> std::io::Result<usize> {
        let Some(path) = self.snapshot_path() else {
            return Ok(0);
        };
        let snapshots = self.store.snapshots();
        save_snapshots(&path, snapshots.iter())
    }

    /// Cancel pending checks, stop the store and persist its snapshots.
    pub fn shutdown(&self) {
        self.decider.cancellation_token().cancel();
        self.store.shutdown();
        if let Err(e) = self.persist_snapshots() {
            tracing::error!(error = %e, "Failed to persist breaker snapshots");
        }
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        self.config.load().store.snapshot_path.as_ref().map(PathBuf::from)
    }
}

/// Run the service until a shutdown signal arrives.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "durable-breaker starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        breakers = config.breakers.len(),
        execute_timeout_ms = config.store.execute_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.server.bind_address.clone();
    let services = Services::assemble(config, Arc::new(SystemClock));
    match services.restore_snapshots() {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "Restored breaker snapshots"),
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable snapshot file"),
    }

    // Without a file there is nothing to watch; the sender stays alive so
    // the server's update loop simply idles.
    let (_idle_tx, idle_rx) = mpsc::unbounded_channel();
    let (_watcher, updates) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, idle_rx),
    };

    let shutdown = Arc::new(Shutdown::new());
    let shutdown_rx = shutdown.subscribe();
    let signal_task = signals::spawn_signal_handler(shutdown.clone());

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(services.app_state());
    let served = server.run(listener, updates, shutdown_rx).await;

    signal_task.abort();
    services.shutdown();
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
