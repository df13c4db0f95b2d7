//! Chat turns, completion requests, and completion outputs
//!
//! A conversation is an ordered list of [`ChatTurn`]s. The two observable outputs
//! of a completion are [`Fragment`] (incremental) and [`FinalAnswer`] (complete).

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a chat turn
///
/// Roles outside the three well-known ones are kept verbatim so that callers
/// can pass through whatever their history store holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// System instructions
    System,

    /// End-user input
    User,

    /// Earlier assistant output
    Assistant,

    /// Any other role name, kept as given
    Other(String),
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other(name) => name,
        }
    }

    /// Label used when the role is rendered into a text prompt
    ///
    /// Unknown roles are title-cased: every letter that follows a non-letter is
    /// upper-cased and every other letter lower-cased.
    pub fn label(&self) -> String {
        match self {
            Self::System => "System".to_string(),
            Self::User => "User".to_string(),
            Self::Assistant => "Assistant".to_string(),
            Self::Other(name) => title_case(name),
        }
    }

    /// Whether this is one of system, user, or assistant
    pub fn is_conversational(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut previous_is_letter = false;
    for ch in raw.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn
    pub role: Role,

    /// Turn text
    pub content: String,
}

impl ChatTurn {
    /// Create a turn with an arbitrary role
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A chat completion request as issued by the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered conversation turns (at least one)
    #[serde(alias = "messages")]
    pub turns: Vec<ChatTurn>,

    /// Whether the caller wants an incremental stream
    #[serde(default, alias = "stream")]
    pub streaming: bool,

    /// Model override; the provider's configured model is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Create a non-streaming request
    pub fn new(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            streaming: false,
            model: None,
        }
    }

    /// Request an incremental stream
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Override the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Check the request can be sent
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRequest`] when there are no turns.
    pub fn validate(&self) -> Result<()> {
        validate_turns(&self.turns)
    }
}

/// Check that a conversation has at least one turn
pub fn validate_turns(turns: &[ChatTurn]) -> Result<()> {
    if turns.is_empty() {
        return Err(ProtocolError::InvalidRequest(
            "at least one turn is required".to_string(),
        ));
    }
    Ok(())
}

/// How a fragment was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Emitted by the assistant itself as an incremental delta
    Delta,

    /// A group of words cut from a complete answer (synthesized stream)
    WordGroup,
}

/// One incremental piece of a streamed answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Fragment text
    pub text: String,

    /// How the fragment was produced
    pub kind: FragmentKind,
}

impl Fragment {
    /// A fragment delivered by the assistant
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FragmentKind::Delta,
        }
    }

    /// A fragment cut from a complete answer
    pub fn word_group(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: FragmentKind::WordGroup,
        }
    }
}

/// The complete answer of a completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Answer text
    pub text: String,
}

impl FinalAnswer {
    /// Wrap answer text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
