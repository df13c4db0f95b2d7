//! OpenAI-compatible response objects
//!
//! The bridge answers in the `chat.completion` / `chat.completion.chunk` shapes
//! so that any OpenAI client library can talk to a CLI assistant.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fresh `chatcmpl-<hex>` identifier
pub fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// An assistant message inside a completion choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    /// Always "assistant"
    pub role: String,

    /// Answer text
    pub content: String,
}

/// One choice of an aggregated completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Choice index (always 0)
    pub index: u32,

    /// The answer
    pub message: CompletionMessage,

    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Aggregated chat completion (`object: "chat.completion"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// `chatcmpl-<hex>` identifier
    pub id: String,

    /// Object type
    pub object: String,

    /// Unix timestamp in seconds
    pub created: i64,

    /// Model that answered
    pub model: String,

    /// Exactly one choice
    pub choices: Vec<CompletionChoice>,
}

impl ChatCompletion {
    /// Wrap a complete answer
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion".to_string(),
            created: now(),
            model: model.into(),
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: "assistant".to_string(),
                    content: content.into(),
                },
                finish_reason: Some("stop".to_string()),
            }],
        }
    }

    /// Text of the first choice
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Incremental content of a chunk choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Fragment text
    pub content: String,
}

/// One choice of a streamed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index (always 0)
    pub index: u32,

    /// The fragment
    pub delta: ChunkDelta,

    /// Always `null` for content chunks
    pub finish_reason: Option<String>,
}

/// Streamed chat completion chunk (`object: "chat.completion.chunk"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// `chatcmpl-<hex>` identifier
    pub id: String,

    /// Object type
    pub object: String,

    /// Unix timestamp in seconds
    pub created: i64,

    /// Model that answered
    pub model: String,

    /// Exactly one choice
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Wrap one fragment
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: completion_id(),
            object: "chat.completion.chunk".to_string(),
            created: now(),
            model: model.into(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: content.into(),
                },
                finish_reason: None,
            }],
        }
    }

    /// Reuse the identifier of an earlier chunk of the same stream
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A model served by one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCard {
    /// Model identifier
    pub id: String,

    /// Object type (always "model")
    pub object: String,

    /// Unix timestamp in seconds
    pub created: i64,

    /// Owner label, e.g. `codex-cli`
    pub owned_by: String,
}

impl ModelCard {
    /// Create a model card
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_string(),
            created: now(),
            owned_by: owned_by.into(),
        }
    }
}

/// Model listing (`object: "list"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Object type
    pub object: String,

    /// Served models
    pub data: Vec<ModelCard>,
}

impl ModelList {
    /// Create a listing
    pub fn new(data: Vec<ModelCard>) -> Self {
        Self {
            object: "list".to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_shape() {
        let completion = ChatCompletion::new("codex", "Hi there");
        assert!(completion.id.starts_with("chatcmpl-"));
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.content(), Some("Hi there"));

        let json = serde_json::to_value(&completion).unwrap();
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
    }

    #[test]
    fn test_chunk_shape() {
        let chunk = ChatCompletionChunk::new("codex", "Hi");
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["choices"][0]["delta"]["content"], "Hi");
        assert!(json["choices"][0]["finish_reason"].is_null());
    }
}
