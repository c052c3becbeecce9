//! Asynchronous units of work submitted against a key's actor.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one submitted unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkHandle(Uuid);

impl WorkHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Progress of a unit of work, as reported by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkStatus {
    Pending,
    Running,
    /// Finished; carries the serialized operation result.
    Completed(serde_json::Value),
    Canceled,
    Failed(String),
    /// Abandoned by the store, e.g. during shutdown.
    Terminated,
}

impl WorkStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkStatus::Pending | WorkStatus::Running)
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        match self {
            WorkStatus::Pending => RuntimeStatus::Pending,
            WorkStatus::Running => RuntimeStatus::Running,
            WorkStatus::Completed(_) => RuntimeStatus::Completed,
            WorkStatus::Canceled => RuntimeStatus::Canceled,
            WorkStatus::Failed(_) => RuntimeStatus::Failed,
            WorkStatus::Terminated => RuntimeStatus::Terminated,
        }
    }
}

/// Status label without payload, including the poller's synthesized outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeStatus {
    Pending,
    Running,
    Completed,
    Canceled,
    Failed,
    Terminated,
    /// The poller gave up waiting.
    TimedOut,
    /// Completed, but the output did not parse as the expected type.
    Unknown,
}

impl RuntimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Pending => "pending",
            RuntimeStatus::Running => "running",
            RuntimeStatus::Completed => "completed",
            RuntimeStatus::Canceled => "canceled",
            RuntimeStatus::Failed => "failed",
            RuntimeStatus::Terminated => "terminated",
            RuntimeStatus::TimedOut => "timed_out",
            RuntimeStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
