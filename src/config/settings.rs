//! Resolved per-key breaker settings.
//!
//! Raw string values come from a [`ConfigSource`]; this module applies the
//! named defaults, parses, validates and caches them per key.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

use crate::breaker::BreakerState;
use crate::config::duration::{parse_iso8601, parse_positive};
use crate::config::source::ConfigSource;
use crate::error::{BreakerError, BreakerResult};

/// Setting names, as looked up in a [`ConfigSource`].
pub mod items {
    pub const MAX_CONSECUTIVE_FAILURES: &str = "MaxConsecutiveFailures";
    pub const BREAK_DURATION: &str = "BreakDuration";
    pub const CONSISTENCY_TIMEOUT: &str = "ConsistencyPriorityCheckCircuitTimeout";
    pub const CONSISTENCY_RETRY_INTERVAL: &str = "ConsistencyPriorityCheckCircuitRetryInterval";
    pub const CHECK_CIRCUIT_INTERVAL: &str = "PerformancePriorityCheckCircuitInterval";
    pub const LOG_LEVEL: &str = "LogLevel";
}

pub const DEFAULT_CONSISTENCY_TIMEOUT: &str = "PT2S";
pub const DEFAULT_CONSISTENCY_RETRY_INTERVAL: &str = "PT0.25S";
pub const DEFAULT_CHECK_CIRCUIT_INTERVAL: &str = "PT2S";
pub const DEFAULT_LOG_LEVEL: Level = Level::INFO;

/// Timeout and polling cadence for consistency-priority checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencySettings {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl ConsistencySettings {
    /// `retry_interval` must not exceed `timeout`.
    pub fn new(key: &str, timeout: Duration, retry_interval: Duration) -> BreakerResult<Self> {
        if retry_interval > timeout {
            return Err(BreakerError::configuration(
                key,
                format!(
                    "retry interval {:?} must not exceed check timeout {:?}",
                    retry_interval, timeout
                ),
            ));
        }
        Ok(Self {
            timeout,
            retry_interval,
        })
    }
}

/// Per-key settings resolver with a cache of the strategy settings.
pub struct SettingsProvider {
    source: Arc<dyn ConfigSource>,
    consistency: DashMap<String, ConsistencySettings>,
    check_intervals: DashMap<String, Option<Duration>>,
}

impl SettingsProvider {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            consistency: DashMap::new(),
            check_intervals: DashMap::new(),
        }
    }

    /// Raw lookup, no defaults applied.
    pub fn raw(&self, key: &str, name: &str) -> Option<String> {
        self.source.get(key, name)
    }

    /// Build the initial state for a key being configured for the first time.
    ///
    /// There are intentionally no defaults here: the tolerances must be
    /// chosen for each guarded operation.
    pub fn initial_state(&self, key: &str) -> BreakerResult<BreakerState> {
        let raw_break = self.raw(key, items::BREAK_DURATION).ok_or_else(|| {
            BreakerError::configuration(key, format!("{} is not set", items::BREAK_DURATION))
        })?;
        let break_duration = parse_positive(&raw_break).map_err(|e| {
            BreakerError::configuration(key, format!("{} must be a positive duration: {}", items::BREAK_DURATION, e))
        })?;

        let raw_max = self.raw(key, items::MAX_CONSECUTIVE_FAILURES).ok_or_else(|| {
            BreakerError::configuration(key, format!("{} is not set", items::MAX_CONSECUTIVE_FAILURES))
        })?;
        let max_consecutive_failures = raw_max
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                BreakerError::configuration(
                    key,
                    format!(
                        "{} must be an integer greater than or equal to 1, got '{}'",
                        items::MAX_CONSECUTIVE_FAILURES, raw_max
                    ),
                )
            })?;

        Ok(BreakerState::closed(max_consecutive_failures, break_duration))
    }

    /// Timeout and retry interval for consistency-priority checks.
    pub fn consistency(&self, key: &str) -> BreakerResult<ConsistencySettings> {
        if let Some(cached) = self.consistency.get(key) {
            return Ok(*cached);
        }

        let timeout = self.duration_or_default(key, items::CONSISTENCY_TIMEOUT, DEFAULT_CONSISTENCY_TIMEOUT)?;
        let retry_interval =
            self.duration_or_default(key, items::CONSISTENCY_RETRY_INTERVAL, DEFAULT_CONSISTENCY_RETRY_INTERVAL)?;

        let timeout = non_negative(key, items::CONSISTENCY_TIMEOUT, timeout)?;
        let retry_interval = non_negative(key, items::CONSISTENCY_RETRY_INTERVAL, retry_interval)?;
        let settings = ConsistencySettings::new(key, timeout, retry_interval)?;

        self.consistency.insert(key.to_string(), settings);
        Ok(settings)
    }

    /// Cache TTL for throughput-priority reads. `None` disables caching.
    pub fn check_circuit_interval(&self, key: &str) -> BreakerResult<Option<Duration>> {
        if let Some(cached) = self.check_intervals.get(key) {
            return Ok(*cached);
        }

        let interval = self.duration_or_default(key, items::CHECK_CIRCUIT_INTERVAL, DEFAULT_CHECK_CIRCUIT_INTERVAL)?;
        let ttl = interval.to_std().ok().filter(|d| !d.is_zero());

        self.check_intervals.insert(key.to_string(), ttl);
        Ok(ttl)
    }

    /// Severity for this key's breaker messages. `None` silences them.
    ///
    /// Accepts tracing names (`info`, `warn`) and the .NET-style names
    /// (`Information`, `Warning`, `Critical`, `None`); anything else falls back
    /// to the default.
    pub fn log_level(&self, key: &str) -> Option<Level> {
        match self.raw(key, items::LOG_LEVEL) {
            Some(raw) => parse_log_level(&raw).unwrap_or(Some(DEFAULT_LOG_LEVEL)),
            None => Some(DEFAULT_LOG_LEVEL),
        }
    }

    /// Drop cached strategy settings after a configuration reload.
    pub fn invalidate(&self) {
        self.consistency.clear();
        self.check_intervals.clear();
    }

    fn duration_or_default(&self, key: &str, name: &str, default: &str) -> BreakerResult<chrono::Duration> {
        let raw = self.raw(key, name);
        let value = raw.as_deref().unwrap_or(default);
        parse_iso8601(value).map_err(|e| BreakerError::configuration(key, format!("{}: {}", name, e)))
    }
}

fn non_negative(key: &str, name: &str, value: chrono::Duration) -> BreakerResult<Duration> {
    value
        .to_std()
        .map_err(|_| BreakerError::configuration(key, format!("{} must not be negative", name)))
}

/// Parse a level name. `Ok(None)` means logging is switched off.
pub(crate) fn parse_log_level(raw: &str) -> Result<Option<Level>, ()> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Some(Level::TRACE)),
        "debug" => Ok(Some(Level::DEBUG)),
        "info" | "information" => Ok(Some(Level::INFO)),
        "warn" | "warning" => Ok(Some(Level::WARN)),
        "error" | "critical" => Ok(Some(Level::ERROR)),
        "none" | "off" => Ok(None),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::config::source::MemoryConfigSource;

    fn provider(source: MemoryConfigSource) -> SettingsProvider {
        SettingsProvider::new(Arc::new(source))
    }

    #[test]
    fn test_initial_state_requires_both_parameters() {
        let settings = provider(MemoryConfigSource::new().with("k", items::BREAK_DURATION, "PT10S"));
        let err = settings.initial_state("k").unwrap_err();
        assert!(matches!(err, BreakerError::Configuration { .. }));

        let settings = provider(MemoryConfigSource::new().with("k", items::MAX_CONSECUTIVE_FAILURES, "3"));
        assert!(settings.initial_state("k").is_err());
    }

    #[test]
    fn test_initial_state_rejects_invalid_values() {
        for (max, brk) in [("0", "PT10S"), ("-1", "PT10S"), ("three", "PT10S"), ("3", "PT0S"), ("3", "-PT5S"), ("3", "10")] {
            let settings = provider(
                MemoryConfigSource::new()
                    .with("k", items::MAX_CONSECUTIVE_FAILURES, max)
                    .with("k", items::BREAK_DURATION, brk),
            );
            assert!(settings.initial_state("k").is_err(), "max={} break={}", max, brk);
        }
    }

    #[test]
    fn test_initial_state() {
        let settings = provider(
            MemoryConfigSource::new()
                .with("k", items::MAX_CONSECUTIVE_FAILURES, "3")
                .with("k", items::BREAK_DURATION, "PT10S"),
        );
        let state = settings.initial_state("k").unwrap();
        assert_eq!(state.circuit_state, CircuitState::Closed);
        assert_eq!(state.max_consecutive_failures, 3);
        assert_eq!(state.break_duration, Duration::from_secs(10));
    }

    #[test]
    fn test_consistency_defaults() {
        let settings = provider(MemoryConfigSource::new());
        let consistency = settings.consistency("k").unwrap();
        assert_eq!(consistency.timeout, Duration::from_secs(2));
        assert_eq!(consistency.retry_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_retry_interval_longer_than_timeout_is_rejected() {
        let settings = provider(
            MemoryConfigSource::new()
                .with("k", items::CONSISTENCY_TIMEOUT, "PT2S")
                .with("k", items::CONSISTENCY_RETRY_INTERVAL, "PT5S"),
        );
        let err = settings.consistency("k").unwrap_err();
        assert!(matches!(err, BreakerError::Configuration { .. }));
    }

    #[test]
    fn test_check_interval_disabled_when_not_positive() {
        let source = MemoryConfigSource::new()
            .with("zero", items::CHECK_CIRCUIT_INTERVAL, "PT0S")
            .with("negative", items::CHECK_CIRCUIT_INTERVAL, "-PT1S");
        let settings = provider(source);
        assert_eq!(settings.check_circuit_interval("zero").unwrap(), None);
        assert_eq!(settings.check_circuit_interval("negative").unwrap(), None);
        assert_eq!(
            settings.check_circuit_interval("default").unwrap(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_strategy_settings_cached_until_invalidated() {
        let source = Arc::new(MemoryConfigSource::new().with("k", items::CONSISTENCY_TIMEOUT, "PT3S"));
        let settings = SettingsProvider::new(source.clone());
        assert_eq!(settings.consistency("k").unwrap().timeout, Duration::from_secs(3));

        source.set("k", items::CONSISTENCY_TIMEOUT, "PT4S");
        assert_eq!(settings.consistency("k").unwrap().timeout, Duration::from_secs(3));

        settings.invalidate();
        assert_eq!(settings.consistency("k").unwrap().timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_log_level() {
        let settings = provider(
            MemoryConfigSource::new()
                .with("warn", items::LOG_LEVEL, "Warning")
                .with("off", items::LOG_LEVEL, "None")
                .with("junk", items::LOG_LEVEL, "loud"),
        );
        assert_eq!(settings.log_level("warn"), Some(Level::WARN));
        assert_eq!(settings.log_level("off"), None);
        assert_eq!(settings.log_level("junk"), Some(Level::INFO));
        assert_eq!(settings.log_level("unset"), Some(Level::INFO));
    }
}
