//! Process transports for command-line AI assistants
//!
//! Delivers a flattened prompt to an external assistant process and hands back
//! its raw output lines. Three strategies share one [`ProcessTransport`] trait:
//!
//! - **Exec**: a fresh process per request, prompt on stdin or as the last argument
//! - **Stdio daemon**: one persistent process, JSON request lines over stdin/stdout
//! - **Socket daemon**: one persistent process behind a Unix domain socket
//!
//! Interpreting the output lines is left to the caller.
//!
//! # Usage
//!
//! ```ignore
//! use clibridge_transport::{TransportConfig, TransportRequest, build_transport};
//!
//! let transport = build_transport(&TransportConfig::exec("codex exec --json -"))?;
//! let mut exchange = transport.send(&TransportRequest::new("codex", "User: hi\n\nAssistant:")).await?;
//! while let Some(line) = exchange.receive_line().await? {
//!     println!("{line}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
#[cfg(unix)]
pub mod socket;
pub mod state;
pub mod subprocess;
pub mod traits;

use std::sync::Arc;

pub use config::{PromptInput, TransportConfig, TransportMode, tokenize};
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use socket::SocketDaemonTransport;
pub use state::DaemonState;
pub use subprocess::{ExecTransport, ProcessConfig, ProcessHandle, StdioDaemonTransport};
pub use traits::{Exchange, LineReceiver, ProcessTransport, TransportRequest};

/// Build the transport selected by `config.mode`
///
/// Configuration is validated here, so a bad command line or a missing socket
/// path fails before any request is made.
pub fn build_transport(config: &TransportConfig) -> Result<Arc<dyn ProcessTransport>> {
    let transport: Arc<dyn ProcessTransport> = match config.mode {
        TransportMode::Exec => Arc::new(ExecTransport::new(config)?),
        TransportMode::DaemonStdio => Arc::new(StdioDaemonTransport::new(config)?),
        #[cfg(unix)]
        TransportMode::DaemonSocket => Arc::new(SocketDaemonTransport::new(config)?),
        #[cfg(not(unix))]
        TransportMode::DaemonSocket => {
            return Err(TransportError::Config(
                "socket daemons require Unix domain sockets".to_string(),
            ));
        }
    };
    tracing::debug!(mode = %config.mode, command = %config.active_command(), "transport built");
    Ok(transport)
}
