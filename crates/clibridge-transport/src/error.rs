//! Transport error types

use std::time::Duration;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur in transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The configured executable could not be launched
    #[error("process not found: {program}")]
    ProcessNotFound {
        /// Program that failed to launch
        program: String,
    },

    /// The process ran and exited with a failure status
    #[error("process exited with status {}: {message}", status_label(.code))]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured error output, or standard output when error output was empty
        message: String,
    },

    /// No usable response within the configured window
    #[error("timed out after {}s waiting for a response", .0.as_secs())]
    Timeout(Duration),

    /// The process answered with something unusable
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid transport configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Process management error (pipes unavailable, daemon gone)
    #[error("process error: {0}")]
    Process(String),

    /// Socket connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn status_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<clibridge_protocol::ProtocolError> for TransportError {
    fn from(err: clibridge_protocol::ProtocolError) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl TransportError {
    /// Map a spawn failure to the right error kind
    pub(crate) fn spawn_failed(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ProcessNotFound {
                program: program.to_string(),
            }
        } else {
            Self::Process(format!("failed to spawn '{}': {}", program, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_not_found_maps_to_process_not_found() {
        let err = TransportError::spawn_failed(
            "codex",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(err, TransportError::ProcessNotFound { ref program } if program == "codex"));
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = TransportError::NonZeroExit {
            code: Some(1),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "process exited with status 1: boom");
    }
}
