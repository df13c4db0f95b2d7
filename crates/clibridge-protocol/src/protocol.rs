//! Line protocol spoken to persistent assistant daemons
//!
//! Both daemon transports (stdio and socket) send exactly one JSON object per
//! request, terminated by a newline:
//!
//! ```text
//! {"type":"chat","model":"codex","prompt":"User: hi\n\nAssistant:"}
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One request written to a daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    /// Request type (always "chat")
    #[serde(rename = "type")]
    pub request_type: String,

    /// Model requested from the daemon
    pub model: String,

    /// Flattened text prompt
    pub prompt: String,
}

impl DaemonRequest {
    /// Create a chat request
    pub fn chat(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            request_type: "chat".to_string(),
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    /// Serialize to a single newline-terminated line
    ///
    /// JSON string escaping guarantees the prompt's own newlines never split the
    /// line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
