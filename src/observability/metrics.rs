//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_admissions_total` (counter): checks by strategy and outcome
//! - `breaker_fail_open_total` (counter): consistency checks that failed open, by status
//! - `breaker_transitions_total` (counter): state changes by from/to
//! - `breaker_outcomes_total` (counter): recorded successes and failures
//! - `breaker_cache_lookups_total` (counter): throughput cache hits and misses
//! - `breaker_actors` (gauge): live per-key actors
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::breaker::CircuitState;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_admission(strategy: &'static str, permitted: bool) {
    let outcome = if permitted { "permitted" } else { "denied" };
    counter!("breaker_admissions_total", "strategy" => strategy, "outcome" => outcome).increment(1);
}

pub fn record_fail_open(status: &'static str) {
    counter!("breaker_fail_open_total", "status" => status).increment(1);
}

pub fn record_transition(from: CircuitState, to: CircuitState) {
    counter!(
        "breaker_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_outcome(outcome: &'static str) {
    counter!("breaker_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("breaker_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_actor_count(count: usize) {
    gauge!("breaker_actors").set(count as f64);
}
