//! Admission subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → guard.rs (optional: check, run, record)
//!     → decider.rs (pick strategy)
//!         → store (execute / submit)
//!         → poller.rs (consistency polling)
//!         → cache.rs (throughput snapshot reads)
//! ```
//!
//! # Design Decisions
//! - The strategy is chosen per call, not per key
//! - Only the consistency strategy fails open
//! - Cached snapshots are never used to mutate a breaker

pub mod cache;
pub mod decider;
pub mod guard;
pub mod poller;
pub mod strategy;

pub use cache::ReadThroughCache;
pub use decider::AdmissionDecider;
pub use guard::BreakerGuard;
pub use poller::{PollOutcome, TimeoutPoller};
pub use strategy::{Strategy, UnknownStrategy};
