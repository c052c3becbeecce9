//! Run an operation behind a breaker.

use std::future::Future;
use std::sync::Arc;

use crate::admission::decider::AdmissionDecider;
use crate::admission::strategy::Strategy;
use crate::error::{BreakerError, GuardError};

#[derive(Debug, Clone)]
pub struct BreakerGuard {
    decider: Arc<AdmissionDecider>,
}

impl BreakerGuard {
    pub fn new(decider: Arc<AdmissionDecider>) -> Self {
        Self { decider }
    }

    /// Check admission, run `operation` if permitted and record its outcome.
    ///
    /// Returns [`BreakerError::BrokenCircuit`] without running the operation
    /// when the breaker denies it. Errors from recording the outcome are
    /// returned in place of the operation's result.
    pub async fn run<T, E, F, Fut>(&self, key: &str, strategy: Strategy, operation: F) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.decider.is_execution_permitted(key, strategy).await? {
            return Err(BreakerError::BrokenCircuit(key.to_string()).into());
        }

        match operation().await {
            Ok(value) => {
                self.decider.record_success(key).await?;
                Ok(value)
            }
            Err(e) => {
                self.decider.record_failure(key).await?;
                Err(GuardError::Operation(e))
            }
        }
    }
}
