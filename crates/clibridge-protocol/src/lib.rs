//! Shared wire and data types for clibridge
//!
//! This crate provides the type definitions used by both the transport layer
//! (`clibridge-transport`) and the client layer (`clibridge`).
//!
//! # Type Organization
//!
//! - **Conversation types**: [`message`] - roles, turns, requests, fragments
//! - **Daemon line protocol**: [`protocol`] - the one-line daemon request
//! - **Response objects**: [`types`] - OpenAI-compatible completions and model lists
//! - **Native events**: [`events`] - delta/error/done events for history-owning callers
//! - **Error types**: [`error`]
//!
//! All types are pure data: no I/O happens here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod message;
pub mod protocol;
pub mod types;

// Re-export commonly used types at crate level
pub use error::{ProtocolError, Result};
pub use events::{NativeAnswer, NativeEvent};
pub use message::{
    ChatTurn, CompletionRequest, FinalAnswer, Fragment, FragmentKind, Role, validate_turns,
};
pub use protocol::DaemonRequest;
pub use types::{ChatCompletion, ChatCompletionChunk, ModelCard, ModelList, completion_id};
