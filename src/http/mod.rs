//! HTTP adapter over the admission decider.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → middleware/auth.rs (optional bearer key)
//!     → handlers.rs (parse key and strategy, call the decider)
//!     → response.rs (map breaker errors to status codes)
//! ```

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;

pub use response::ApiError;
pub use server::{AppState, HttpServer};
