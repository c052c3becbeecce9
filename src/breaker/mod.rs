//! Breaker state and state machine.
//!
//! # States
//! - Closed: normal operation, executions pass through
//! - Open: guarded operation assumed down, executions refused
//! - HalfOpen: one trial execution admitted after the break
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= max_consecutive_failures
//! Open → HalfOpen: first admission check after broken_until
//! HalfOpen → Closed: success recorded
//! HalfOpen → Open: failure recorded (new broken_until)
//! ```
//!
//! # Design Decisions
//! - Per-key breaker (never global)
//! - Transitions are pure functions of (state, now); the store serializes them
//! - An Open breaker whose break has elapsed is treated as HalfOpen when
//!   recording outcomes, matching the admission check's own promotion

pub mod machine;
pub mod state;

pub use state::{BreakerState, CircuitState};
