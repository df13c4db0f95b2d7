//! Transport trait
//!
//! Defines the [`ProcessTransport`] capability implemented by the exec, stdio
//! daemon, and socket daemon transports. A client holds one transport chosen
//! from configuration and never branches on the mode itself.

use crate::config::TransportMode;
use crate::error::Result;
use crate::state::DaemonState;
use async_trait::async_trait;

/// What a transport delivers to the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Model requested (daemons receive it in the request line)
    pub model: String,

    /// Flattened text prompt
    pub prompt: String,
}

impl TransportRequest {
    /// Create a request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// Raw output lines of one in-flight request
///
/// Every call is bounded by the request deadline. `Ok(None)` means the
/// response is over (process exited, socket closed). Dropping the receiver
/// ends the exchange: exec children are killed, daemons are released for the
/// next request but keep running.
#[async_trait]
pub trait LineReceiver: Send {
    /// Receive the next raw output line, without its line terminator
    async fn receive_line(&mut self) -> Result<Option<String>>;
}

/// An in-flight request
pub type Exchange = Box<dyn LineReceiver>;

/// Delivers prompts to an external assistant process
#[async_trait]
pub trait ProcessTransport: Send + Sync {
    /// The configured strategy
    fn mode(&self) -> TransportMode;

    /// Make sure the backing process is running
    ///
    /// Exec transports have nothing to start.
    async fn start(&self) -> Result<()>;

    /// Deliver a prompt and return its output lines
    async fn send(&self, request: &TransportRequest) -> Result<Exchange>;

    /// Whether the backing process is running (always true for exec)
    async fn is_alive(&self) -> bool;

    /// Lifecycle state of the backing daemon, if there is one
    async fn state(&self) -> Option<DaemonState> {
        None
    }

    /// Stop the backing process, if any
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
