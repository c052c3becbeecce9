//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! service file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → swapped into Arc<ArcSwap<ServiceConfig>>
//!
//! Per-key lookup:
//!     source.rs (env overrides → [breakers.<key>] table)
//!     → settings.rs (defaults, ISO-8601 parsing, per-key cache)
//!     → breaker parameters / strategy settings / log level
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → atomic swap, settings cache invalidated
//! ```
//!
//! # Design Decisions
//! - MaxConsecutiveFailures and BreakDuration have no defaults
//! - Breaker parameters are fixed once a key's state exists
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod settings;
pub mod source;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{BreakerConfig, ObservabilityConfig, ServerConfig, ServiceConfig, StoreConfig};
pub use settings::{ConsistencySettings, SettingsProvider};
pub use source::{ConfigSource, EnvConfigSource, FileConfigSource, LayeredConfigSource, MemoryConfigSource};
