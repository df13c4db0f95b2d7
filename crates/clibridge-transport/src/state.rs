//! Daemon lifecycle states
//!
//! ```text
//! NotStarted -> Starting -> Ready <-> Busy
//!                   ^         |        |
//!                   +------ Failed <---+
//! ```
//!
//! Any I/O failure moves a daemon to `Failed`; the next request starts it again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a persistent assistant process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    /// No process has been started yet
    NotStarted,

    /// The process is being spawned (or its socket awaited)
    Starting,

    /// Idle and ready for a request
    Ready,

    /// A request is in flight
    Busy,

    /// The last start or exchange failed
    Failed,
}

impl DaemonState {
    /// Whether the next request has to (re)start the process
    pub fn needs_start(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Failed)
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Busy => "busy",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
