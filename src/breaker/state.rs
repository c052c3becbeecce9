//! Persisted breaker state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// All executions permitted.
    Closed,
    /// Executions blocked until `broken_until`.
    Open,
    /// A single trial execution has been admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// State of one breaker key.
///
/// Owned by the key's actor; anything else holds a disposable copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerState {
    pub circuit_state: CircuitState,
    /// Only consulted while Open or HalfOpen.
    pub broken_until: Option<DateTime<Utc>>,
    pub consecutive_failure_count: u32,
    pub max_consecutive_failures: u32,
    #[serde(with = "crate::config::duration::serde_iso8601")]
    pub break_duration: Duration,
}

impl BreakerState {
    /// A freshly configured, closed breaker.
    pub fn closed(max_consecutive_failures: u32, break_duration: Duration) -> Self {
        Self {
            circuit_state: CircuitState::Closed,
            broken_until: None,
            consecutive_failure_count: 0,
            max_consecutive_failures,
            break_duration,
        }
    }

    /// True when `now` is past the end of the current break.
    ///
    /// A missing `broken_until` counts as already expired.
    pub fn break_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.broken_until {
            Some(until) => now > until,
            None => true,
        }
    }

    /// HalfOpen, or Open with an expired break.
    pub fn is_logically_half_open(&self, now: DateTime<Utc>) -> bool {
        match self.circuit_state {
            CircuitState::HalfOpen => true,
            CircuitState::Open => self.break_elapsed(now),
            CircuitState::Closed => false,
        }
    }

    /// `now + break_duration`, saturating at the latest representable time.
    pub fn break_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.break_duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
