//! Bounded polling of a unit of work's status.
//!
//! The poller sleeps `min(retry_interval, remaining)` between queries, so it
//! never sleeps past its timeout, and always queries at least once.

use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::settings::ConsistencySettings;
use crate::error::{BreakerError, BreakerResult};
use crate::store::{RuntimeStatus, WorkStatus};

/// What polling observed. `value` is present only for a completed unit of
/// work whose output parsed as `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    pub value: Option<T>,
    pub status: RuntimeStatus,
}

impl<T> PollOutcome<T> {
    fn empty(status: RuntimeStatus) -> Self {
        Self { value: None, status }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutPoller {
    timeout: Duration,
    retry_interval: Duration,
}

impl TimeoutPoller {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            timeout,
            retry_interval,
        }
    }

    /// Query until the work is terminal, the timeout elapses, or `cancel`
    /// fires.
    ///
    /// A failed status query counts as "no status yet". Cancellation returns
    /// [`BreakerError::Cancelled`].
    pub async fn await_completion<T, Q, Fut>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        mut query: Q,
    ) -> BreakerResult<PollOutcome<T>>
    where
        T: DeserializeOwned,
        Q: FnMut() -> Fut,
        Fut: Future<Output = BreakerResult<Option<WorkStatus>>>,
    {
        let started = Instant::now();

        loop {
            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BreakerError::Cancelled(key.to_string())),
                observed = query() => observed,
            };

            match observed {
                Ok(Some(WorkStatus::Completed(output))) => {
                    return Ok(match serde_json::from_value::<T>(output) {
                        Ok(value) => PollOutcome {
                            value: Some(value),
                            status: RuntimeStatus::Completed,
                        },
                        Err(e) => {
                            tracing::debug!(breaker_key = %key, error = %e, "Unparseable work output");
                            PollOutcome::empty(RuntimeStatus::Unknown)
                        }
                    });
                }
                Ok(Some(status)) if status.is_terminal() => {
                    return Ok(PollOutcome::empty(status.runtime_status()));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(breaker_key = %key, error = %e, "Work status query failed");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                return Ok(PollOutcome::empty(RuntimeStatus::TimedOut));
            }

            let pause = self.retry_interval.min(self.timeout - elapsed);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BreakerError::Cancelled(key.to_string())),
                _ = sleep(pause) => {}
            }
        }
    }
}

impl From<ConsistencySettings> for TimeoutPoller {
    fn from(settings: ConsistencySettings) -> Self {
        Self::new(settings.timeout, settings.retry_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scripted(statuses: Vec<BreakerResult<Option<WorkStatus>>>) -> Mutex<VecDeque<BreakerResult<Option<WorkStatus>>>> {
        Mutex::new(statuses.into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_value() {
        let script = scripted(vec![
            Ok(Some(WorkStatus::Pending)),
            Err(BreakerError::store_unavailable("k", "blip")),
            Ok(Some(WorkStatus::Running)),
            Ok(Some(WorkStatus::Completed(serde_json::Value::Bool(false)))),
        ]);
        let poller = TimeoutPoller::new(Duration::from_secs(2), Duration::from_millis(250));
        let cancel = CancellationToken::new();

        let outcome = poller
            .await_completion::<bool, _, _>("k", &cancel, || {
                let next = script.lock().pop_front().unwrap_or(Ok(None));
                async move { next }
            })
            .await
            .unwrap();

        assert_eq!(outcome.value, Some(false));
        assert_eq!(outcome.status, RuntimeStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_oversleeping() {
        let queries = AtomicUsize::new(0);
        let poller = TimeoutPoller::new(Duration::from_millis(600), Duration::from_millis(250));
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let outcome = poller
            .await_completion::<bool, _, _>("k", &cancel, || {
                queries.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some(WorkStatus::Running)) }
            })
            .await
            .unwrap();

        assert_eq!(outcome, PollOutcome::empty(RuntimeStatus::TimedOut));
        assert_eq!(started.elapsed(), Duration::from_millis(600));
        // t = 0, 250, 500, 600
        assert_eq!(queries.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_queries_once() {
        let queries = AtomicUsize::new(0);
        let poller = TimeoutPoller::new(Duration::ZERO, Duration::ZERO);
        let cancel = CancellationToken::new();

        let outcome = poller
            .await_completion::<bool, _, _>("k", &cancel, || {
                queries.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, RuntimeStatus::TimedOut);
        assert_eq!(queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_statuses() {
        let poller = TimeoutPoller::new(Duration::from_secs(2), Duration::from_millis(250));
        let cancel = CancellationToken::new();

        for (status, expected) in [
            (WorkStatus::Failed("boom".into()), RuntimeStatus::Failed),
            (WorkStatus::Canceled, RuntimeStatus::Canceled),
            (WorkStatus::Terminated, RuntimeStatus::Terminated),
            (WorkStatus::Completed(serde_json::json!("Closed")), RuntimeStatus::Unknown),
        ] {
            let outcome = poller
                .await_completion::<bool, _, _>("k", &cancel, || {
                    let status = status.clone();
                    async move { Ok(Some(status)) }
                })
                .await
                .unwrap();
            assert_eq!(outcome, PollOutcome::empty(expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let poller = TimeoutPoller::new(Duration::from_secs(30), Duration::from_secs(1));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });

        let err = poller
            .await_completion::<bool, _, _>("k", &cancel, || async { Ok(Some(WorkStatus::Pending)) })
            .await
            .unwrap_err();
        assert_eq!(err, BreakerError::Cancelled("k".to_string()));
    }
}
