//! Prompt construction
//!
//! Assistant CLIs take a single text prompt, so a role-tagged conversation is
//! flattened into labelled paragraphs ending with an open `Assistant:` cue.

use clibridge_protocol::{ChatTurn, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Separator between rendered turns
const TURN_SEPARATOR: &str = "\n\n";

/// Cue that hands the floor to the assistant
const ASSISTANT_CUE: &str = "Assistant:";

/// Flattens conversation turns into one text prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render `turns` as `"<Label>: <content>"` paragraphs plus a trailing cue
    ///
    /// ```
    /// use clibridge::PromptBuilder;
    /// use clibridge_protocol::ChatTurn;
    ///
    /// let prompt = PromptBuilder::build(&[ChatTurn::system("Be brief"), ChatTurn::user("Hi")]);
    /// assert_eq!(prompt, "System: Be brief\n\nUser: Hi\n\nAssistant:");
    /// ```
    pub fn build(turns: &[ChatTurn]) -> String {
        let mut prompt = String::new();
        for turn in turns {
            prompt.push_str(&turn.role.label());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push_str(TURN_SEPARATOR);
        }
        prompt.push_str(ASSISTANT_CUE);
        prompt
    }
}

/// How retrieved context should be used by the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Use the context when relevant, answer general questions normally
    #[default]
    Hybrid,

    /// Answer from the context alone
    #[serde(alias = "rag_only")]
    ContextOnly,
}

impl ContextMode {
    /// Instructions placed ahead of the context
    pub fn intro(&self) -> &'static str {
        match self {
            Self::Hybrid => {
                "Use the provided context when it is relevant. If the question is general \
                and does not require the context, answer normally. Only say you do not have \
                enough information when the answer depends on missing context."
            }
            Self::ContextOnly => {
                "Answer using only the provided context. If the answer is not in the \
                context, say you do not have enough information."
            }
        }
    }
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hybrid => "hybrid",
            Self::ContextOnly => "context_only",
        })
    }
}

impl FromStr for ContextMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "context_only" | "rag_only" => Ok(Self::ContextOnly),
            other => Err(BridgeError::Config(format!(
                "unknown context mode '{}' (expected hybrid or context_only)",
                other
            ))),
        }
    }
}

/// Prepend a retrieval-context system turn to a conversation
///
/// Turns with roles other than system, user, and assistant are dropped.
/// With no context (or only whitespace) the turns come back unchanged.
pub fn with_context(turns: &[ChatTurn], context: Option<&str>, mode: ContextMode) -> Vec<ChatTurn> {
    let Some(context) = context.filter(|c| !c.trim().is_empty()) else {
        return turns.to_vec();
    };

    let mut out = Vec::with_capacity(turns.len() + 1);
    out.push(ChatTurn::new(
        Role::System,
        format!("{}\n\nContext:\n{}", mode.intro(), context),
    ));
    out.extend(turns.iter().filter(|t| t.role.is_conversational()).cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_labels_and_cue() {
        let prompt = PromptBuilder::build(&[
            ChatTurn::user("What is 2+2?"),
            ChatTurn::assistant("4"),
            ChatTurn::new("tool_result", "ok"),
        ]);
        assert_eq!(
            prompt,
            "User: What is 2+2?\n\nAssistant: 4\n\nTool_Result: ok\n\nAssistant:"
        );
    }

    #[test]
    fn test_build_empty_is_just_the_cue() {
        assert_eq!(PromptBuilder::build(&[]), "Assistant:");
    }

    #[test]
    fn test_with_context_prepends_system_turn() {
        let turns = vec![ChatTurn::user("Summarize"), ChatTurn::new("tool", "x")];
        let out = with_context(&turns, Some("Doc text"), ContextMode::ContextOnly);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].role, Role::System);
        assert!(out[0].content.starts_with("Answer using only the provided context."));
        assert!(out[0].content.ends_with("\n\nContext:\nDoc text"));
        assert_eq!(out[1], ChatTurn::user("Summarize"));
    }

    #[test]
    fn test_with_context_absent_is_identity() {
        let turns = vec![ChatTurn::user("hi"), ChatTurn::new("tool", "x")];
        assert_eq!(with_context(&turns, None, ContextMode::Hybrid), turns);
        assert_eq!(with_context(&turns, Some("  \n"), ContextMode::Hybrid), turns);
    }

    #[test]
    fn test_context_mode_parsing() {
        assert_eq!("rag_only".parse::<ContextMode>().unwrap(), ContextMode::ContextOnly);
        assert_eq!("HYBRID".parse::<ContextMode>().unwrap(), ContextMode::Hybrid);
        assert!("everything".parse::<ContextMode>().is_err());
    }
}
