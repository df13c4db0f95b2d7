//! Error types for the bridge
//!
//! Every failure carries an [`ErrorKind`] so callers (and the facade's HTTP
//! mapping) can branch on what went wrong without matching message text.
//! Nothing in this crate retries; errors surface on the first failure.

use clibridge_transport::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Coarse classification of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The assistant executable could not be launched
    ProcessNotFound,
    /// The assistant exited with a failure status
    NonZeroExit,
    /// No usable response within the timeout
    Timeout,
    /// Output could not be turned into an answer
    MalformedResponse,
    /// The assistant reported an error of its own
    UpstreamError,
    /// The request itself is unusable
    InvalidRequest,
    /// Configuration rejected at construction
    Config,
    /// Any other I/O or process failure
    Transport,
}

impl ErrorKind {
    /// Snake-case name used in logs and error frames
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessNotFound => "process_not_found",
            Self::NonZeroExit => "non_zero_exit",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::UpstreamError => "upstream_error",
            Self::InvalidRequest => "invalid_request",
            Self::Config => "config",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while talking to an assistant
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The configured executable was not found
    #[error("assistant executable not found: {program}")]
    ProcessNotFound {
        /// Program that failed to launch
        program: String,
    },

    /// The process exited with a failure status
    #[error("assistant exited with status {}: {message}", exit_status(.code))]
    NonZeroExit {
        /// Exit code, if any
        code: Option<i32>,
        /// Trimmed stderr, or stdout when stderr was empty
        message: String,
    },

    /// No usable response in time
    #[error("assistant timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Output did not contain an answer
    #[error("malformed assistant response: {0}")]
    MalformedResponse(String),

    /// The assistant emitted an explicit error object
    #[error("assistant error: {0}")]
    UpstreamError(String),

    /// The request cannot be sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl BridgeError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProcessNotFound { .. } => ErrorKind::ProcessNotFound,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::UpstreamError(_) => ErrorKind::UpstreamError,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// What an operator should do about this error
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::ProcessNotFound { .. } => {
                "Install the assistant CLI or fix the configured command so its \
                executable is on PATH."
            }
            Self::NonZeroExit { .. } => {
                "The assistant CLI failed. Check its authentication and the \
                message it printed."
            }
            Self::Timeout(_) => {
                "No answer arrived in time. Raise the timeout or check that the \
                daemon is responsive."
            }
            Self::MalformedResponse(_) => {
                "The assistant produced no recognizable answer. Check that the \
                command emits JSON lines or plain text."
            }
            Self::UpstreamError(_) => "The assistant reported an error. See the message for details.",
            Self::InvalidRequest(_) => "Send at least one conversation turn.",
            Self::Config(_) => "Fix the named configuration value and restart.",
            Self::Transport(_) => "Process or socket I/O failed. Check the daemon logs.",
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ProcessNotFound { program } => Self::ProcessNotFound { program },
            TransportError::NonZeroExit { code, message } => Self::NonZeroExit { code, message },
            TransportError::Timeout(after) => Self::Timeout(after),
            TransportError::MalformedResponse(msg) => Self::MalformedResponse(msg),
            TransportError::Config(msg) => Self::Config(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<clibridge_protocol::ProtocolError> for BridgeError {
    fn from(err: clibridge_protocol::ProtocolError) -> Self {
        match err {
            clibridge_protocol::ProtocolError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}
