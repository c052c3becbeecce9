//! Pure breaker transitions.
//!
//! Every function takes the current state and `now` and returns the next
//! state. Nothing here touches a clock, a lock or a log; the caller (the key's
//! actor) guarantees that calls for one key never interleave.

use chrono::{DateTime, Utc};

use crate::breaker::state::{BreakerState, CircuitState};

/// Decide whether an execution may proceed.
///
/// Open/HalfOpen with an expired break promotes to HalfOpen and pushes the
/// deadline out by one break, so exactly one trial is admitted per cycle.
pub fn check_admission(state: &BreakerState, now: DateTime<Utc>) -> (bool, BreakerState) {
    match state.circuit_state {
        CircuitState::Closed => (true, state.clone()),
        CircuitState::Open | CircuitState::HalfOpen => {
            if state.break_elapsed(now) {
                let mut next = state.clone();
                next.circuit_state = CircuitState::HalfOpen;
                next.broken_until = Some(state.break_deadline(now));
                (true, next)
            } else {
                (false, state.clone())
            }
        }
    }
}

/// Record a successful execution. A success while logically half-open closes.
pub fn record_success(state: &BreakerState, now: DateTime<Utc>) -> BreakerState {
    let mut next = state.clone();
    next.consecutive_failure_count = 0;

    if state.is_logically_half_open(now) {
        next.circuit_state = CircuitState::Closed;
        next.broken_until = None;
    }

    next
}

/// Record a failed execution.
///
/// Opens when a closed breaker reaches its threshold, or on any failure while
/// logically half-open.
pub fn record_failure(state: &BreakerState, now: DateTime<Utc>) -> BreakerState {
    let mut next = state.clone();
    next.consecutive_failure_count = state.consecutive_failure_count.saturating_add(1);

    let threshold_reached = state.circuit_state == CircuitState::Closed
        && next.consecutive_failure_count >= state.max_consecutive_failures;

    if threshold_reached || state.is_logically_half_open(now) {
        next.circuit_state = CircuitState::Open;
        next.broken_until = Some(state.break_deadline(now));
    }

    next
}
