//! Admission decisions and outcome recording.
//!
//! # Strategies
//! ```text
//! Fidelity     → store.execute(CheckAdmission)           errors propagate
//! Consistency  → store.submit + TimeoutPoller             fails open
//! Throughput   → ReadThroughCache(store.read_snapshot)    read errors permit
//! ```
//!
//! Throughput never mutates state, so while a breaker is half-open any
//! number of concurrent callers may be admitted as trials.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::admission::cache::ReadThroughCache;
use crate::admission::poller::TimeoutPoller;
use crate::admission::strategy::Strategy;
use crate::breaker::{BreakerState, CircuitState};
use crate::clock::Clock;
use crate::config::settings::SettingsProvider;
use crate::error::{BreakerError, BreakerResult};
use crate::observability::{metrics, BreakerLogger};
use crate::store::{BreakerOperation, KeyedActorStore, OperationResult, WorkHandle};

pub struct AdmissionDecider {
    store: Arc<dyn KeyedActorStore>,
    settings: Arc<SettingsProvider>,
    clock: Arc<dyn Clock>,
    logger: BreakerLogger,
    snapshots: ReadThroughCache<Option<BreakerState>>,
    cancel: CancellationToken,
}

impl AdmissionDecider {
    pub fn new(
        store: Arc<dyn KeyedActorStore>,
        settings: Arc<SettingsProvider>,
        clock: Arc<dyn Clock>,
        logger: BreakerLogger,
    ) -> Self {
        Self {
            store,
            snapshots: ReadThroughCache::new(clock.clone()),
            settings,
            clock,
            logger,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelled on shutdown; consistency checks in flight stop polling.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drop cached settings and snapshots after a configuration reload.
    pub fn reload(&self) {
        self.settings.invalidate();
        self.snapshots.clear();
    }

    pub async fn is_execution_permitted(&self, key: &str, strategy: Strategy) -> BreakerResult<bool> {
        let cancel = self.cancel.child_token();
        self.is_execution_permitted_with_cancel(key, strategy, &cancel).await
    }

    /// As [`is_execution_permitted`](Self::is_execution_permitted), with a
    /// caller-owned cancellation token.
    pub async fn is_execution_permitted_with_cancel(
        &self,
        key: &str,
        strategy: Strategy,
        cancel: &CancellationToken,
    ) -> BreakerResult<bool> {
        let permitted = match strategy {
            Strategy::Fidelity => self.fidelity_check(key).await?,
            Strategy::Consistency => self.consistency_check(key, cancel).await?,
            Strategy::Throughput => self.throughput_check(key).await?,
        };

        metrics::record_admission(strategy.as_str(), permitted);
        tracing::debug!(breaker_key = %key, strategy = %strategy, permitted, "Admission checked");
        Ok(permitted)
    }

    pub async fn record_success(&self, key: &str) -> BreakerResult<CircuitState> {
        let result = self.store.execute(key, BreakerOperation::RecordSuccess).await?;
        expect_state(key, result)
    }

    pub async fn record_failure(&self, key: &str) -> BreakerResult<CircuitState> {
        let result = self.store.execute(key, BreakerOperation::RecordFailure).await?;
        expect_state(key, result)
    }

    /// Authoritative state, read through the key's actor. Configures the key
    /// on first use.
    pub async fn get_circuit_state(&self, key: &str) -> BreakerResult<CircuitState> {
        let result = self.store.execute(key, BreakerOperation::GetCircuitState).await?;
        expect_state(key, result)
    }

    /// Latest snapshot; `None` if the key was never initialized.
    pub async fn get_breaker_state(&self, key: &str) -> BreakerResult<Option<BreakerState>> {
        self.store.read_snapshot(key).await
    }

    async fn fidelity_check(&self, key: &str) -> BreakerResult<bool> {
        let result = self.store.execute(key, BreakerOperation::CheckAdmission).await?;
        result.permitted().ok_or_else(|| {
            BreakerError::store_unavailable(key, format!("unexpected result {:?} for admission check", result))
        })
    }

    async fn consistency_check(&self, key: &str, cancel: &CancellationToken) -> BreakerResult<bool> {
        let poller = TimeoutPoller::from(self.settings.consistency(key)?);

        let handle = match self.store.submit(key, BreakerOperation::CheckAdmission).await {
            Ok(handle) => handle,
            Err(e) => {
                self.logger.log(
                    key,
                    format!("Circuit check could not be submitted for {}: {}. Permitting execution.", key, e),
                );
                metrics::record_fail_open("submit_failed");
                return Ok(true);
            }
        };

        let pending = PendingWork::new(self.store.clone(), handle);
        let store = &self.store;
        let work = &handle;
        let outcome = poller
            .await_completion::<bool, _, _>(key, cancel, move || store.work_status(work))
            .await;
        pending.release().await;

        let outcome = outcome?;
        match outcome.value {
            Some(permitted) => Ok(permitted),
            None => {
                self.logger.log(
                    key,
                    format!(
                        "Circuit check for {} ended with status {}. Permitting execution.",
                        key, outcome.status
                    ),
                );
                metrics::record_fail_open(outcome.status.as_str());
                Ok(true)
            }
        }
    }

    async fn throughput_check(&self, key: &str) -> BreakerResult<bool> {
        let ttl = self.settings.check_circuit_interval(key)?;
        let store = &self.store;

        let snapshot = match self
            .snapshots
            .get_or_load(key, ttl, || store.read_snapshot(key))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(breaker_key = %key, error = %e, "Snapshot read failed, treating breaker as absent");
                None
            }
        };

        Ok(match snapshot {
            None => true,
            Some(state) => match state.circuit_state {
                CircuitState::Closed => true,
                CircuitState::Open | CircuitState::HalfOpen => state.break_elapsed(self.clock.now()),
            },
        })
    }
}

fn expect_state(key: &str, result: OperationResult) -> BreakerResult<CircuitState> {
    result.circuit_state().ok_or_else(|| {
        BreakerError::store_unavailable(key, format!("unexpected result {:?} for state operation", result))
    })
}

impl std::fmt::Debug for AdmissionDecider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionDecider")
            .field("clock", &self.clock)
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

/// A submitted unit of work that is released on every exit path.
///
/// If the check is dropped mid-poll (request timeout, client disconnect)
/// the release is spawned onto the current runtime.
struct PendingWork {
    store: Arc<dyn KeyedActorStore>,
    handle: Option<WorkHandle>,
}

impl PendingWork {
    fn new(store: Arc<dyn KeyedActorStore>, handle: WorkHandle) -> Self {
        Self {
            store,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.release(&handle).await;
        }
    }
}

impl Drop for PendingWork {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = self.store.clone();
                runtime.spawn(async move { store.release(&handle).await });
            }
            Err(_) => tracing::warn!(work = %handle, "No runtime to release abandoned circuit check"),
        }
    }
}
