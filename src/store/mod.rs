//! Per-key state ownership.
//!
//! # Data Flow
//! ```text
//! execute(key, op)
//!     → actor.rs: mailbox for key (spawned lazily)
//!     → actor applies op via breaker::machine (one at a time per key)
//!     → snapshot map updated, result returned
//!
//! read_snapshot(key)
//!     → snapshot map only, never queued behind the mailbox
//!
//! submit(key, op) / work_status(handle)
//!     → work unit runs execute in the background, status polled by caller
//! ```
//!
//! # Design Decisions
//! - One bounded mailbox per key, not a global lock
//! - Operations are a tagged enum so ordering is enforced by the queue
//! - Snapshots may trail in-flight operations; they are never used to mutate

pub mod actor;
pub mod persistence;
pub mod work;

use async_trait::async_trait;
use serde_json::Value;

use crate::breaker::{BreakerState, CircuitState};
use crate::error::BreakerResult;

pub use actor::{ActorRegistry, StoreOptions};
pub use work::{RuntimeStatus, WorkHandle, WorkStatus};

/// Operations a key's actor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerOperation {
    CheckAdmission,
    RecordSuccess,
    RecordFailure,
    GetCircuitState,
}

impl BreakerOperation {
    pub fn name(&self) -> &'static str {
        match self {
            BreakerOperation::CheckAdmission => "CheckAdmission",
            BreakerOperation::RecordSuccess => "RecordSuccess",
            BreakerOperation::RecordFailure => "RecordFailure",
            BreakerOperation::GetCircuitState => "GetCircuitState",
        }
    }
}

/// What an operation returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// From `CheckAdmission`.
    Permitted(bool),
    /// From the record operations and `GetCircuitState`: the state afterwards.
    State(CircuitState),
}

impl OperationResult {
    pub fn permitted(&self) -> Option<bool> {
        match self {
            OperationResult::Permitted(p) => Some(*p),
            OperationResult::State(_) => None,
        }
    }

    pub fn circuit_state(&self) -> Option<CircuitState> {
        match self {
            OperationResult::State(s) => Some(*s),
            OperationResult::Permitted(_) => None,
        }
    }

    /// Serialized form stored as a work unit's output.
    pub fn into_value(self) -> Value {
        match self {
            OperationResult::Permitted(p) => Value::Bool(p),
            OperationResult::State(s) => serde_json::to_value(s).unwrap_or(Value::Null),
        }
    }
}

/// Exclusive, serialized ownership of each key's [`BreakerState`].
#[async_trait]
pub trait KeyedActorStore: Send + Sync {
    /// Run `operation` with exclusive access to the key's state.
    ///
    /// Calls for one key are applied in arrival order; calls for different
    /// keys are independent. Fails with `StoreUnavailable` when the store
    /// cannot answer within its own deadline.
    async fn execute(&self, key: &str, operation: BreakerOperation) -> BreakerResult<OperationResult>;

    /// Most recently persisted state, without waiting on queued operations.
    async fn read_snapshot(&self, key: &str) -> BreakerResult<Option<BreakerState>>;

    /// Start `operation` as a background unit of work.
    async fn submit(&self, key: &str, operation: BreakerOperation) -> BreakerResult<WorkHandle>;

    /// Current status of a unit of work; `None` for an unknown handle.
    async fn work_status(&self, handle: &WorkHandle) -> BreakerResult<Option<WorkStatus>>;

    /// Forget a unit of work. Its result, if still pending, is discarded.
    async fn release(&self, handle: &WorkHandle);
}
