//! Error taxonomy for breaker operations.

use thiserror::Error;

/// Errors surfaced by the breaker core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BreakerError {
    /// Missing or invalid per-key configuration. Fatal; never retried.
    #[error("circuit-breaker '{key}' is misconfigured: {reason}")]
    Configuration { key: String, reason: String },

    /// The state owner for a key could not complete an operation in time.
    #[error("circuit-breaker '{key}' store unavailable: {reason}")]
    StoreUnavailable { key: String, reason: String },

    /// Execution was not permitted; the guarded call should short-circuit.
    #[error("circuit-breaker '{0}' is open; execution not permitted")]
    BrokenCircuit(String),

    /// The caller abandoned the request before it completed.
    #[error("request against circuit-breaker '{0}' was cancelled")]
    Cancelled(String),
}

impl BreakerError {
    pub fn configuration(key: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(key: &str, reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Transient errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Result alias used throughout the crate.
pub type BreakerResult<T> = Result<T, BreakerError>;

/// Error returned by [`crate::admission::BreakerGuard::run`].
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The breaker refused, or failed to evaluate, the call.
    #[error(transparent)]
    Breaker(#[from] BreakerError),

    /// The guarded operation ran and failed; the failure has been recorded.
    #[error("guarded operation failed: {0}")]
    Operation(E),
}

impl<E> GuardError<E> {
    pub fn is_broken_circuit(&self) -> bool {
        matches!(self, Self::Breaker(BreakerError::BrokenCircuit(_)))
    }
}
