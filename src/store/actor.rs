//! In-process actor store: one tokio task per breaker key.
//!
//! # Responsibilities
//! - Spawn a key's actor on first use and configure its state lazily
//! - Apply operations strictly in mailbox order
//! - Publish each changed state to the snapshot map
//! - Track background units of work for `submit`/`work_status`
//!
//! # Design Decisions
//! - Actors never hold the registry's actor map, so dropping the registry
//!   closes every mailbox and ends every task
//! - An operation that times out on the caller side may still be applied
//!   later; its result is dropped

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use async_trait::async_trait;

use crate::breaker::{machine, BreakerState, CircuitState};
use crate::clock::Clock;
use crate::config::schema::StoreConfig;
use crate::config::settings::SettingsProvider;
use crate::error::{BreakerError, BreakerResult};
use crate::observability::{metrics, BreakerLogger};
use crate::store::{BreakerOperation, KeyedActorStore, OperationResult, WorkHandle, WorkStatus};

/// Store tuning.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Upper bound on one `execute` call, queueing included.
    pub execute_timeout: Duration,
    pub mailbox_capacity: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            execute_timeout: Duration::from_secs(5),
            mailbox_capacity: 1024,
        }
    }
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            execute_timeout: Duration::from_millis(config.execute_timeout_ms),
            mailbox_capacity: config.mailbox_capacity.max(1),
        }
    }
}

struct Envelope {
    operation: BreakerOperation,
    reply: oneshot::Sender<BreakerResult<OperationResult>>,
}

/// State shared with every actor task.
struct ActorContext {
    snapshots: DashMap<String, BreakerState>,
    settings: Arc<SettingsProvider>,
    clock: Arc<dyn Clock>,
    logger: BreakerLogger,
}

/// Registry of per-key actors. Cheap to clone.
#[derive(Clone)]
pub struct ActorRegistry {
    context: Arc<ActorContext>,
    actors: Arc<DashMap<String, mpsc::Sender<Envelope>>>,
    work: Arc<DashMap<WorkHandle, WorkStatus>>,
    closed: Arc<AtomicBool>,
    options: StoreOptions,
}

impl ActorRegistry {
    pub fn new(
        settings: Arc<SettingsProvider>,
        clock: Arc<dyn Clock>,
        logger: BreakerLogger,
        options: StoreOptions,
    ) -> Self {
        Self {
            context: Arc::new(ActorContext {
                snapshots: DashMap::new(),
                settings,
                clock,
                logger,
            }),
            actors: Arc::new(DashMap::new()),
            work: Arc::new(DashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Seed snapshots, e.g. from a file saved by a previous run.
    ///
    /// Only keys without a live actor are restored.
    pub fn restore(&self, snapshots: HashMap<String, BreakerState>) {
        for (key, state) in snapshots {
            if !self.actors.contains_key(&key) {
                self.context.snapshots.insert(key, state);
            }
        }
    }

    /// Copy of every persisted state.
    pub fn snapshots(&self) -> HashMap<String, BreakerState> {
        self.context
            .snapshots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Submitted units of work that have not been released.
    pub fn outstanding_work(&self) -> usize {
        self.work.len()
    }

    /// Mark every unfinished unit of work as terminated.
    pub fn terminate_outstanding(&self) -> usize {
        let mut terminated = 0;
        for mut entry in self.work.iter_mut() {
            if !entry.is_terminal() {
                *entry = WorkStatus::Terminated;
                terminated += 1;
            }
        }
        terminated
    }

    /// Stop accepting operations and close every mailbox.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let terminated = self.terminate_outstanding();
        let actors = self.actors.len();
        self.actors.clear();
        metrics::record_actor_count(0);
        tracing::info!(actors = actors, terminated_work = terminated, "Actor store shut down");
    }

    fn mailbox(&self, key: &str) -> mpsc::Sender<Envelope> {
        if let Some(sender) = self.actors.get(key) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }

        let sender = match self.actors.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    let sender = self.spawn_actor(key);
                    occupied.insert(sender.clone());
                    sender
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let sender = self.spawn_actor(key);
                vacant.insert(sender.clone());
                sender
            }
        };
        metrics::record_actor_count(self.actors.len());
        sender
    }

    fn spawn_actor(&self, key: &str) -> mpsc::Sender<Envelope> {
        let (sender, receiver) = mpsc::channel(self.options.mailbox_capacity);
        let context = self.context.clone();
        let key = key.to_string();
        tracing::debug!(breaker_key = %key, "Spawning breaker actor");
        tokio::spawn(run_actor(key, receiver, context));
        sender
    }

    fn update_work(&self, handle: &WorkHandle, status: WorkStatus) {
        // Released handles are gone; terminated ones stay terminated.
        if let Some(mut entry) = self.work.get_mut(handle) {
            if !entry.is_terminal() {
                *entry = status;
            }
        }
    }
}

async fn run_actor(key: String, mut receiver: mpsc::Receiver<Envelope>, context: Arc<ActorContext>) {
    let mut state = context.snapshots.get(&key).map(|s| s.clone());

    while let Some(envelope) = receiver.recv().await {
        let result = context.apply(&key, &mut state, envelope.operation);
        let _ = envelope.reply.send(result);
    }

    tracing::debug!(breaker_key = %key, "Breaker actor stopped");
}

impl ActorContext {
    fn apply(
        &self,
        key: &str,
        slot: &mut Option<BreakerState>,
        operation: BreakerOperation,
    ) -> BreakerResult<OperationResult> {
        let current = match slot {
            Some(state) => state.clone(),
            None => {
                let state = self.settings.initial_state(key)?;
                self.logger
                    .log(key, format!("Setting configuration for circuit-breaker {}.", key));
                state
            }
        };

        let now = self.clock.now();
        let (result, next) = match operation {
            BreakerOperation::CheckAdmission => {
                let (permitted, next) = machine::check_admission(&current, now);
                if permitted && current.circuit_state != CircuitState::Closed {
                    self.logger
                        .log(key, format!("Permitting a test execution in half-open state: {}.", key));
                }
                (OperationResult::Permitted(permitted), next)
            }
            BreakerOperation::RecordSuccess => {
                let next = machine::record_success(&current, now);
                if current.circuit_state != CircuitState::Closed && next.circuit_state == CircuitState::Closed {
                    self.logger.log(key, format!("Circuit re-closing: {}.", key));
                }
                metrics::record_outcome("success");
                (OperationResult::State(next.circuit_state), next)
            }
            BreakerOperation::RecordFailure => {
                let next = machine::record_failure(&current, now);
                if next.circuit_state == CircuitState::Open && next.broken_until != current.broken_until {
                    self.logger.log(key, format!("Circuit opening/re-opening: {}.", key));
                }
                metrics::record_outcome("failure");
                (OperationResult::State(next.circuit_state), next)
            }
            BreakerOperation::GetCircuitState => (OperationResult::State(current.circuit_state), current.clone()),
        };

        if current.circuit_state != next.circuit_state {
            metrics::record_transition(current.circuit_state, next.circuit_state);
        }

        if slot.as_ref() != Some(&next) {
            self.snapshots.insert(key.to_string(), next.clone());
            *slot = Some(next);
        }

        Ok(result)
    }
}

#[async_trait]
impl KeyedActorStore for ActorRegistry {
    async fn execute(&self, key: &str, operation: BreakerOperation) -> BreakerResult<OperationResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BreakerError::store_unavailable(key, "store is shutting down"));
        }

        let mailbox = self.mailbox(key);
        let (reply, response) = oneshot::channel();
        let deadline = self.options.execute_timeout;

        let dispatch = async {
            mailbox
                .send(Envelope { operation, reply })
                .await
                .map_err(|_| BreakerError::store_unavailable(key, "actor mailbox closed"))?;
            response
                .await
                .map_err(|_| BreakerError::store_unavailable(key, "actor dropped the request"))?
        };

        match tokio::time::timeout(deadline, dispatch).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(breaker_key = %key, operation = operation.name(), timeout = ?deadline, "Store operation timed out");
                Err(BreakerError::store_unavailable(
                    key,
                    format!("{} did not complete within {:?}", operation.name(), deadline),
                ))
            }
        }
    }

    async fn read_snapshot(&self, key: &str) -> BreakerResult<Option<BreakerState>> {
        Ok(self.context.snapshots.get(key).map(|s| s.clone()))
    }

    async fn submit(&self, key: &str, operation: BreakerOperation) -> BreakerResult<WorkHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BreakerError::store_unavailable(key, "store is shutting down"));
        }

        let handle = WorkHandle::new();
        self.work.insert(handle, WorkStatus::Pending);

        let registry = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            registry.update_work(&handle, WorkStatus::Running);
            let status = match registry.execute(&key, operation).await {
                Ok(result) => WorkStatus::Completed(result.into_value()),
                Err(BreakerError::Cancelled(_)) => WorkStatus::Canceled,
                Err(e) => WorkStatus::Failed(e.to_string()),
            };
            registry.update_work(&handle, status);
        });

        Ok(handle)
    }

    async fn work_status(&self, handle: &WorkHandle) -> BreakerResult<Option<WorkStatus>> {
        Ok(self.work.get(handle).map(|s| s.clone()))
    }

    async fn release(&self, handle: &WorkHandle) {
        self.work.remove(handle);
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.actors.len())
            .field("snapshots", &self.context.snapshots.len())
            .field("work", &self.work.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::settings::items;
    use crate::config::source::MemoryConfigSource;
    use chrono::Utc;

    fn registry(clock: ManualClock) -> ActorRegistry {
        let source = MemoryConfigSource::new()
            .with("orders", items::MAX_CONSECUTIVE_FAILURES, "2")
            .with("orders", items::BREAK_DURATION, "PT10S");
        let settings = Arc::new(SettingsProvider::new(Arc::new(source)));
        ActorRegistry::new(
            settings.clone(),
            Arc::new(clock),
            BreakerLogger::tracing(settings),
            StoreOptions::default(),
        )
    }

    async fn wait_terminal(store: &ActorRegistry, handle: &WorkHandle) -> WorkStatus {
        loop {
            if let Some(status) = store.work_status(handle).await.unwrap() {
                if status.is_terminal() {
                    return status;
                }
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_lazy_configuration_and_snapshot() {
        let store = registry(ManualClock::new(Utc::now()));
        assert_eq!(store.read_snapshot("orders").await.unwrap(), None);

        let result = store.execute("orders", BreakerOperation::GetCircuitState).await.unwrap();
        assert_eq!(result, OperationResult::State(CircuitState::Closed));

        let snapshot = store.read_snapshot("orders").await.unwrap().unwrap();
        assert_eq!(snapshot.max_consecutive_failures, 2);
        assert_eq!(snapshot.consecutive_failure_count, 0);
    }

    #[tokio::test]
    async fn test_unconfigured_key_fails() {
        let store = registry(ManualClock::new(Utc::now()));
        let err = store.execute("unknown", BreakerOperation::CheckAdmission).await.unwrap_err();
        assert!(matches!(err, BreakerError::Configuration { .. }));
        assert_eq!(store.read_snapshot("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_operations_apply_in_order() {
        let clock = ManualClock::new(Utc::now());
        let store = registry(clock.clone());

        store.execute("orders", BreakerOperation::RecordFailure).await.unwrap();
        let state = store.execute("orders", BreakerOperation::RecordFailure).await.unwrap();
        assert_eq!(state, OperationResult::State(CircuitState::Open));

        let permitted = store.execute("orders", BreakerOperation::CheckAdmission).await.unwrap();
        assert_eq!(permitted, OperationResult::Permitted(false));

        clock.advance(chrono::Duration::seconds(11));
        let permitted = store.execute("orders", BreakerOperation::CheckAdmission).await.unwrap();
        assert_eq!(permitted, OperationResult::Permitted(true));

        let state = store.execute("orders", BreakerOperation::RecordSuccess).await.unwrap();
        assert_eq!(state, OperationResult::State(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_concurrent_checks_admit_one_trial() {
        let clock = ManualClock::new(Utc::now());
        let store = registry(clock.clone());
        store.execute("orders", BreakerOperation::RecordFailure).await.unwrap();
        store.execute("orders", BreakerOperation::RecordFailure).await.unwrap();
        clock.advance(chrono::Duration::seconds(11));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.execute("orders", BreakerOperation::CheckAdmission).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() == OperationResult::Permitted(true) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_submitted_work_completes() {
        let store = registry(ManualClock::new(Utc::now()));
        let handle = store.submit("orders", BreakerOperation::CheckAdmission).await.unwrap();

        let status = wait_terminal(&store, &handle).await;
        assert_eq!(status, WorkStatus::Completed(serde_json::Value::Bool(true)));

        store.release(&handle).await;
        assert_eq!(store.work_status(&handle).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_submitted_work_reports_failure() {
        let store = registry(ManualClock::new(Utc::now()));
        let handle = store.submit("unknown", BreakerOperation::CheckAdmission).await.unwrap();
        assert!(matches!(wait_terminal(&store, &handle).await, WorkStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_shutdown_terminates_and_rejects() {
        let store = registry(ManualClock::new(Utc::now()));
        store.work.insert(WorkHandle::new(), WorkStatus::Running);
        store.work.insert(WorkHandle::new(), WorkStatus::Completed(serde_json::Value::Bool(true)));

        store.shutdown();

        let terminated = store
            .work
            .iter()
            .filter(|entry| *entry.value() == WorkStatus::Terminated)
            .count();
        assert_eq!(terminated, 1);

        let err = store.execute("orders", BreakerOperation::CheckAdmission).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_restore_seeds_new_actors() {
        let store = registry(ManualClock::new(Utc::now()));
        let mut open = BreakerState::closed(2, Duration::from_secs(10));
        open.circuit_state = CircuitState::Open;
        open.broken_until = Some(Utc::now() + chrono::Duration::hours(1));

        let mut snapshots = HashMap::new();
        snapshots.insert("orders".to_string(), open);
        store.restore(snapshots);

        let permitted = store.execute("orders", BreakerOperation::CheckAdmission).await.unwrap();
        assert_eq!(permitted, OperationResult::Permitted(false));
    }
}
