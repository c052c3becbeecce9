//! Admission strategies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How an admission check trades accuracy against latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Serialized check through the key's actor. Exact; errors propagate.
    #[default]
    Fidelity,
    /// Serialized check as a polled unit of work, bounded by a timeout.
    /// Fails open.
    Consistency,
    /// Cached snapshot read. Never mutates and never queues.
    Throughput,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fidelity => "fidelity",
            Strategy::Consistency => "consistency",
            Strategy::Throughput => "throughput",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy '{0}', expected fidelity, consistency or throughput")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fidelity" | "fidelitypriority" => Ok(Strategy::Fidelity),
            "consistency" | "consistencypriority" => Ok(Strategy::Consistency),
            "throughput" | "throughputpriority" | "performance" | "performancepriority" => Ok(Strategy::Throughput),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
