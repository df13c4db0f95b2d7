//! Chat bridge for command-line AI assistants
//!
//! Exposes CLI assistants (Codex, Gemini, anything that reads a prompt and
//! prints JSON lines or text) behind one chat interface with both aggregated
//! answers and incremental streams.
//!
//! # Architecture
//!
//! The bridge is built on three layers:
//!
//! 1. **Protocol Layer** (`clibridge-protocol`): turns, requests, response objects
//! 2. **Transport Layer** (`clibridge-transport`): exec, stdio daemon and socket daemon processes
//! 3. **Bridge Layer** (this crate): prompt building, output normalization,
//!    per-provider clients and the facade an HTTP layer calls
//!
//! Data flows as turns → [`PromptBuilder`] → transport → raw lines →
//! [`ResponseExtractor`] → fragments or answer → [`BridgeFacade`].
//!
//! # Usage Example
//!
//! ```ignore
//! use clibridge::{BridgeConfig, BridgeFacade, Completion};
//! use clibridge_protocol::{ChatTurn, CompletionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let facade = BridgeFacade::new(&BridgeConfig::from_env()?)?;
//!
//!     let request = CompletionRequest::new(vec![ChatTurn::user("What is 2+2?")]);
//!     if let Completion::Aggregated(completion) = facade.complete(None, request).await? {
//!         println!("{}", completion.content().unwrap_or_default());
//!     }
//!
//!     facade.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod facade;
pub mod prompt;
pub mod stream;

// Re-export commonly used types
pub use client::ChatClient;
pub use config::{BridgeConfig, ProviderConfig};
pub use error::{BridgeError, ErrorKind, Result};
pub use extract::{Extraction, Fallback, ResponseAccumulator, ResponseExtractor};
pub use facade::{BridgeFacade, Completion, DONE_FRAME, FacadeError, NativeResponse, SseStream};
pub use prompt::{ContextMode, PromptBuilder, with_context};
pub use stream::{FragmentStream, word_groups};

pub use clibridge_protocol::{ChatTurn, CompletionRequest, Fragment, FragmentKind, Role};
pub use clibridge_transport::{DaemonState, PromptInput, TransportConfig, TransportMode};
