//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check per-breaker settings that are present in the file
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Missing breaker parameters are not an error here; they may come from the
//!   environment and are checked again when the key is first configured

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::duration::{parse_iso8601, parse_positive};
use crate::config::schema::{BreakerConfig, ServiceConfig};
use crate::config::settings::{
    parse_log_level, DEFAULT_CONSISTENCY_RETRY_INTERVAL, DEFAULT_CONSISTENCY_TIMEOUT,
};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if matches!(config.server.api_key.as_deref(), Some(k) if k.trim().is_empty()) {
        errors.push(ValidationError::new("server.api_key", "must not be empty when set"));
    }

    if config.store.execute_timeout_ms == 0 {
        errors.push(ValidationError::new("store.execute_timeout_ms", "must be greater than 0"));
    }
    if config.store.mailbox_capacity == 0 {
        errors.push(ValidationError::new("store.mailbox_capacity", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    for (key, breaker) in &config.breakers {
        validate_breaker(key, breaker, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Breaker keys appear in URLs and environment variable names.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn validate_breaker(key: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("breakers.{}.{}", key, name);

    if !is_valid_key(key) {
        errors.push(ValidationError::new(
            format!("breakers.{}", key),
            "key must be 1-128 characters of [A-Za-z0-9._-]",
        ));
    }

    if breaker.max_consecutive_failures == Some(0) {
        errors.push(ValidationError::new(
            field("max_consecutive_failures"),
            "must be greater than or equal to 1",
        ));
    }

    if let Some(raw) = &breaker.break_duration {
        if let Err(e) = parse_positive(raw) {
            errors.push(ValidationError::new(field("break_duration"), e.to_string()));
        }
    }

    let timeout = breaker
        .consistency_priority_check_circuit_timeout
        .as_deref()
        .unwrap_or(DEFAULT_CONSISTENCY_TIMEOUT);
    let retry = breaker
        .consistency_priority_check_circuit_retry_interval
        .as_deref()
        .unwrap_or(DEFAULT_CONSISTENCY_RETRY_INTERVAL);

    match (parse_iso8601(timeout), parse_iso8601(retry)) {
        (Ok(timeout), Ok(retry)) => {
            if timeout < chrono::Duration::zero() {
                errors.push(ValidationError::new(
                    field("consistency_priority_check_circuit_timeout"),
                    "must not be negative",
                ));
            }
            if retry < chrono::Duration::zero() {
                errors.push(ValidationError::new(
                    field("consistency_priority_check_circuit_retry_interval"),
                    "must not be negative",
                ));
            }
            if retry > timeout {
                errors.push(ValidationError::new(
                    field("consistency_priority_check_circuit_retry_interval"),
                    format!("{} exceeds check timeout {}", retry, timeout),
                ));
            }
        }
        (timeout, retry) => {
            if let Err(e) = timeout {
                errors.push(ValidationError::new(
                    field("consistency_priority_check_circuit_timeout"),
                    e.to_string(),
                ));
            }
            if let Err(e) = retry {
                errors.push(ValidationError::new(
                    field("consistency_priority_check_circuit_retry_interval"),
                    e.to_string(),
                ));
            }
        }
    }

    if let Some(raw) = &breaker.performance_priority_check_circuit_interval {
        if let Err(e) = parse_iso8601(raw) {
            errors.push(ValidationError::new(
                field("performance_priority_check_circuit_interval"),
                e.to_string(),
            ));
        }
    }

    if let Some(raw) = &breaker.log_level {
        if parse_log_level(raw).is_err() {
            errors.push(ValidationError::new(
                field("log_level"),
                format!("unknown level '{}'", raw),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.server.bind_address = "not-an-address".to_string();
        config.store.execute_timeout_ms = 0;
        config.breakers.insert(
            "payments".to_string(),
            BreakerConfig {
                max_consecutive_failures: Some(0),
                break_duration: Some("PT0S".to_string()),
                consistency_priority_check_circuit_timeout: Some("PT2S".to_string()),
                consistency_priority_check_circuit_retry_interval: Some("PT5S".to_string()),
                ..Default::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "store.execute_timeout_ms",
                "breakers.payments.max_consecutive_failures",
                "breakers.payments.break_duration",
                "breakers.payments.consistency_priority_check_circuit_retry_interval",
            ]
        );
    }

    #[test]
    fn test_key_charset() {
        assert!(is_valid_key("payments-api_v2.eu"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("has space"));
        assert!(!is_valid_key("slash/key"));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = ServiceConfig::default();
        config.breakers.insert(
            "orders".to_string(),
            BreakerConfig {
                log_level: Some("shouting".to_string()),
                ..Default::default()
            },
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "breakers.orders.log_level");
    }
}
