//! Durable circuit-breaker service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum) ──▶ admission::AdmissionDecider
//!                                         │
//!                     ┌───────────────────┼────────────────────┐
//!                     ▼                   ▼                    ▼
//!                 Fidelity           Consistency           Throughput
//!              execute(key, op)   submit + poll (fails     cached snapshot
//!                     │             open on timeout)            │
//!                     └──────────┬────────┘                     │
//!                                ▼                              ▼
//!                  store::ActorRegistry (one task per key) ──▶ snapshots
//!                                │
//!                                ▼
//!                     breaker::machine (pure transitions)
//! ```
//!
//! Usage: `durable-breaker [CONFIG.toml]`, or set `BREAKER_CONFIG`.

use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("BREAKER_CONFIG").map(PathBuf::from));

    durable_breaker::lifecycle::run(config_path.as_deref()).await?;
    Ok(())
}
