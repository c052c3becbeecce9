//! Durable, per-key circuit breakers.
//!
//! Each breaker key owns a [`BreakerState`] held by its own actor; callers ask
//! an [`AdmissionDecider`] whether an execution is permitted under one of
//! three strategies and report outcomes back.

pub mod admission;
pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use admission::{AdmissionDecider, BreakerGuard, Strategy};
pub use breaker::{BreakerState, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BreakerError, BreakerResult, GuardError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::{ActorRegistry, KeyedActorStore};
