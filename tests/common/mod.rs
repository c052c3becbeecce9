//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use durable_breaker::admission::AdmissionDecider;
use durable_breaker::breaker::BreakerState;
use durable_breaker::config::settings::items;
use durable_breaker::config::{MemoryConfigSource, ServiceConfig, SettingsProvider};
use durable_breaker::error::{BreakerError, BreakerResult};
use durable_breaker::http::HttpServer;
use durable_breaker::lifecycle::{Services, Shutdown};
use durable_breaker::observability::BreakerLogger;
use durable_breaker::store::{
    ActorRegistry, BreakerOperation, KeyedActorStore, OperationResult, StoreOptions, WorkHandle, WorkStatus,
};
use durable_breaker::{Clock, ManualClock, SystemClock};

/// Source with breaker parameters for each `(key, max_failures, break)`.
pub fn breakers(entries: &[(&str, u32, &str)]) -> MemoryConfigSource {
    entries.iter().fold(MemoryConfigSource::new(), |source, (key, max, brk)| {
        source
            .with(key, items::MAX_CONSECUTIVE_FAILURES, max.to_string())
            .with(key, items::BREAK_DURATION, *brk)
    })
}

/// A decider over the in-process store, driven by a manual clock.
pub struct Harness {
    pub clock: ManualClock,
    pub source: Arc<MemoryConfigSource>,
    pub store: Arc<InstrumentedStore>,
    pub decider: Arc<AdmissionDecider>,
}

impl Harness {
    pub fn new(source: MemoryConfigSource) -> Self {
        let clock = ManualClock::new(Utc::now());
        let source = Arc::new(source);
        let settings = Arc::new(SettingsProvider::new(source.clone()));
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let logger = BreakerLogger::tracing(settings.clone());
        let registry = ActorRegistry::new(settings.clone(), shared_clock.clone(), logger.clone(), StoreOptions::default());
        let store = Arc::new(InstrumentedStore::new(Arc::new(registry)));
        let decider = Arc::new(AdmissionDecider::new(store.clone(), settings, shared_clock, logger));

        Self {
            clock,
            source,
            store,
            decider,
        }
    }

    /// Same wiring over an arbitrary store.
    pub fn with_store(source: MemoryConfigSource, inner: Arc<dyn KeyedActorStore>) -> Self {
        let clock = ManualClock::new(Utc::now());
        let source = Arc::new(source);
        let settings = Arc::new(SettingsProvider::new(source.clone()));
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let logger = BreakerLogger::tracing(settings.clone());
        let store = Arc::new(InstrumentedStore::new(inner));
        let decider = Arc::new(AdmissionDecider::new(store.clone(), settings, shared_clock, logger));

        Self {
            clock,
            source,
            store,
            decider,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(chrono::Duration::from_std(by).unwrap());
    }
}

/// Counts every call before delegating.
pub struct InstrumentedStore {
    inner: Arc<dyn KeyedActorStore>,
    pub executes: AtomicUsize,
    pub snapshot_reads: AtomicUsize,
    pub submits: AtomicUsize,
    pub status_queries: AtomicUsize,
    pub releases: AtomicUsize,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<dyn KeyedActorStore>) -> Self {
        Self {
            inner,
            executes: AtomicUsize::new(0),
            snapshot_reads: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
            + self.snapshot_reads.load(Ordering::SeqCst)
            + self.submits.load(Ordering::SeqCst)
            + self.status_queries.load(Ordering::SeqCst)
            + self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyedActorStore for InstrumentedStore {
    async fn execute(&self, key: &str, operation: BreakerOperation) -> BreakerResult<OperationResult> {
        self.executes.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(key, operation).await
    }

    async fn read_snapshot(&self, key: &str) -> BreakerResult<Option<BreakerState>> {
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_snapshot(key).await
    }

    async fn submit(&self, key: &str, operation: BreakerOperation) -> BreakerResult<WorkHandle> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.inner.submit(key, operation).await
    }

    async fn work_status(&self, handle: &WorkHandle) -> BreakerResult<Option<WorkStatus>> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.work_status(handle).await
    }

    async fn release(&self, handle: &WorkHandle) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release(handle).await
    }
}

/// Accepts work but never finishes it.
pub struct StalledStore;

#[async_trait]
impl KeyedActorStore for StalledStore {
    async fn execute(&self, key: &str, _operation: BreakerOperation) -> BreakerResult<OperationResult> {
        Err(BreakerError::store_unavailable(key, "stalled"))
    }

    async fn read_snapshot(&self, _key: &str) -> BreakerResult<Option<BreakerState>> {
        Ok(None)
    }

    async fn submit(&self, _key: &str, _operation: BreakerOperation) -> BreakerResult<WorkHandle> {
        Ok(WorkHandle::new())
    }

    async fn work_status(&self, _handle: &WorkHandle) -> BreakerResult<Option<WorkStatus>> {
        Ok(Some(WorkStatus::Running))
    }

    async fn release(&self, _handle: &WorkHandle) {}
}

/// Fails every call.
pub struct UnavailableStore;

#[async_trait]
impl KeyedActorStore for UnavailableStore {
    async fn execute(&self, key: &str, _operation: BreakerOperation) -> BreakerResult<OperationResult> {
        Err(BreakerError::store_unavailable(key, "down"))
    }

    async fn read_snapshot(&self, key: &str) -> BreakerResult<Option<BreakerState>> {
        Err(BreakerError::store_unavailable(key, "down"))
    }

    async fn submit(&self, key: &str, _operation: BreakerOperation) -> BreakerResult<WorkHandle> {
        Err(BreakerError::store_unavailable(key, "down"))
    }

    async fn work_status(&self, _handle: &WorkHandle) -> BreakerResult<Option<WorkStatus>> {
        Err(BreakerError::store_unavailable("work", "down"))
    }

    async fn release(&self, _handle: &WorkHandle) {}
}

/// Start the HTTP service on an ephemeral port.
pub async fn start_server(config: ServiceConfig, source: MemoryConfigSource) -> (SocketAddr, Shutdown) {
    let services = Services::with_source(
        Arc::new(ArcSwap::from_pointee(config)),
        Arc::new(source),
        Arc::new(SystemClock),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(services.app_state());

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown)
}
