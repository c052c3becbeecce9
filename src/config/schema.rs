//! Configuration schema definitions.
//!
//! The service file is TOML. Every section has defaults so an empty file is
//! valid; per-breaker settings live under `[breakers.<key>]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::settings::items;

/// Root configuration for the breaker service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP API settings.
    pub server: ServerConfig,

    /// Actor store settings.
    pub store: StoreConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Per-key breaker settings, keyed by breaker key.
    pub breakers: BTreeMap<String, BreakerConfig>,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:7070").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Optional bearer token required on every breaker route.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7070".to_string(),
            request_timeout_secs: 30,
            api_key: None,
        }
    }
}

/// Actor store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for one serialized operation, queueing included, in milliseconds.
    pub execute_timeout_ms: u64,

    /// Bounded mailbox size per breaker key.
    pub mailbox_capacity: usize,

    /// Where breaker snapshots are saved on shutdown and restored on startup.
    pub snapshot_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            execute_timeout_ms: 5_000,
            mailbox_capacity: 1_024,
            snapshot_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) when RUST_LOG is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Settings for one breaker key.
///
/// Durations are ISO-8601 strings. `max_consecutive_failures` and
/// `break_duration` have no defaults; they may also come from the environment.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    pub max_consecutive_failures: Option<u32>,
    pub break_duration: Option<String>,
    pub consistency_priority_check_circuit_timeout: Option<String>,
    pub consistency_priority_check_circuit_retry_interval: Option<String>,
    pub performance_priority_check_circuit_interval: Option<String>,
    pub log_level: Option<String>,
}

impl BreakerConfig {
    /// Look up a setting by its item name.
    pub fn item(&self, name: &str) -> Option<String> {
        match name {
            items::MAX_CONSECUTIVE_FAILURES => self.max_consecutive_failures.map(|n| n.to_string()),
            items::BREAK_DURATION => self.break_duration.clone(),
            items::CONSISTENCY_TIMEOUT => self.consistency_priority_check_circuit_timeout.clone(),
            items::CONSISTENCY_RETRY_INTERVAL => {
                self.consistency_priority_check_circuit_retry_interval.clone()
            }
            items::CHECK_CIRCUIT_INTERVAL => self.performance_priority_check_circuit_interval.clone(),
            items::LOG_LEVEL => self.log_level.clone(),
            _ => None,
        }
    }
}
