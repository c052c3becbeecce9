//! Per-key configuration lookup.
//!
//! # Data Flow
//! ```text
//! get(key, name)
//!     → EnvConfigSource   (CircuitBreakerSettings__<key>__<name>)
//!     → FileConfigSource  ([breakers.<key>] in the service file)
//!     → None              (caller applies the named default, if any)
//! ```

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::schema::ServiceConfig;

/// Environment variable prefix for per-key settings.
pub const ENV_PREFIX: &str = "CircuitBreakerSettings";

/// Looks up a named setting for a breaker key.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str, name: &str) -> Option<String>;
}

/// Reads process environment variables.
///
/// Both `CircuitBreakerSettings:<key>:<name>` and the shell-friendly
/// `CircuitBreakerSettings__<key>__<name>` forms are accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str, name: &str) -> Option<String> {
        std::env::var(format!("{}:{}:{}", ENV_PREFIX, key, name))
            .or_else(|_| std::env::var(format!("{}__{}__{}", ENV_PREFIX, key, name)))
            .ok()
    }
}

/// Reads `[breakers.<key>]` from the current service configuration.
///
/// Shares the swap cell with the config watcher, so reloads are visible
/// without rebuilding the source.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    config: Arc<ArcSwap<ServiceConfig>>,
}

impl FileConfigSource {
    pub fn new(config: Arc<ArcSwap<ServiceConfig>>) -> Self {
        Self { config }
    }
}

impl ConfigSource for FileConfigSource {
    fn get(&self, key: &str, name: &str) -> Option<String> {
        self.config.load().breakers.get(key).and_then(|b| b.item(name))
    }
}

/// In-memory settings, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryConfigSource {
    values: DashMap<(String, String), String>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, name: &str, value: impl Into<String>) {
        self.values.insert((key.to_string(), name.to_string()), value.into());
    }

    pub fn remove(&self, key: &str, name: &str) {
        self.values.remove(&(key.to_string(), name.to_string()));
    }

    /// Builder-style `set`.
    pub fn with(self, key: &str, name: &str, value: impl Into<String>) -> Self {
        self.set(key, name, value);
        self
    }
}

impl ConfigSource for MemoryConfigSource {
    fn get(&self, key: &str, name: &str) -> Option<String> {
        self.values
            .get(&(key.to_string(), name.to_string()))
            .map(|v| v.value().clone())
    }
}

/// First source with a value wins.
#[derive(Default, Clone)]
pub struct LayeredConfigSource {
    layers: Vec<Arc<dyn ConfigSource>>,
}

impl LayeredConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.layers.push(source);
        self
    }
}

impl ConfigSource for LayeredConfigSource {
    fn get(&self, key: &str, name: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key, name))
    }
}
