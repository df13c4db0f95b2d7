//! Events for callers that own conversation history
//!
//! Such callers (a chat UI backed by its own store and retrieval pipeline) get
//! `delta` events while the answer streams, an `error` event if it breaks off,
//! and always a terminal `done` event.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One server-sent event for a history-owning caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NativeEvent {
    /// A streamed fragment
    Delta {
        /// Fragment text
        content: String,
    },

    /// The stream broke off
    Error {
        /// Human-readable failure
        message: String,
    },

    /// End of stream
    Done {
        /// Conversation the answer belongs to, when the caller supplied one
        conversation_id: Option<String>,

        /// Aggregated answer text
        answer: String,

        /// Retrieval sources passed through from the caller
        sources: Option<Vec<Value>>,
    },
}

/// Aggregated answer for a history-owning caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeAnswer {
    /// Conversation the answer belongs to, when the caller supplied one
    pub conversation_id: Option<String>,

    /// Answer text
    pub answer: String,

    /// Retrieval sources passed through from the caller
    pub sources: Option<Vec<Value>>,
}
