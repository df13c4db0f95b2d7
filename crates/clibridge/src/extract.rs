//! Response normalization
//!
//! Assistant CLIs disagree about what their output looks like. Some stream
//! `{"delta":{"content":..}}` chunks, some emit one final message object, some
//! write event envelopes, and some print plain text. [`ResponseExtractor`]
//! classifies a single output line; [`ResponseAccumulator`] folds the lines of
//! one response into either a stream of fragments or one answer.

use crate::error::{BridgeError, Result};
use clibridge_protocol::Fragment;
use clibridge_transport::TransportMode;
use serde_json::{Map, Value};

/// What one output line contributes to a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Incremental text
    Fragment(String),

    /// Complete answer text
    Final(String),

    /// Not JSON (or not a JSON object); kept as a plain-text candidate
    Unstructured(String),

    /// Nothing usable (blank line, progress event, echoed input)
    Nothing,

    /// The assistant reported an error
    UpstreamError(String),
}

type Matcher = fn(&Map<String, Value>) -> Option<Extraction>;

/// Known output shapes, first match wins
const MATCHERS: &[Matcher] = &[
    delta_content,
    assistant_message,
    completed_agent_message,
    final_message_field,
    result_field,
    output_field,
    content_field,
    text_field,
    first_choice,
    response_field,
];

/// Classifies raw output lines
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    /// Classify one output line
    pub fn extract(line: &str) -> Extraction {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Extraction::Nothing;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Object(obj)) => Self::extract_object(&obj),
            _ => Extraction::Unstructured(line.to_string()),
        }
    }

    /// Classify an already parsed JSON object
    pub fn extract_object(obj: &Map<String, Value>) -> Extraction {
        if let Some(message) = upstream_error(obj) {
            return Extraction::UpstreamError(message);
        }

        // Some CLIs echo the user turn back before answering
        if let Some(role) = obj.get("role").and_then(Value::as_str)
            && role != "assistant"
        {
            return Extraction::Nothing;
        }

        MATCHERS
            .iter()
            .find_map(|matcher| matcher(obj))
            .unwrap_or(Extraction::Nothing)
    }
}

fn upstream_error(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("error") {
        Some(Value::Null) | None => {}
        Some(Value::String(message)) => return Some(message.clone()),
        Some(error) => {
            return Some(
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            );
        }
    }

    if obj.get("type").and_then(Value::as_str) == Some("error") {
        return Some(
            obj.get("message")
                .and_then(content_text)
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        );
    }
    None
}

/// Text of a content value, `None` when absent or empty
///
/// Strings are taken verbatim. Arrays of content blocks are concatenated from
/// their `text` fields (or string elements). Anything else non-null is
/// rendered as compact JSON.
pub fn content_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn delta_content(obj: &Map<String, Value>) -> Option<Extraction> {
    let delta = obj.get("delta")?.as_object()?;
    content_text(delta.get("content")?).map(Extraction::Fragment)
}

fn assistant_message(obj: &Map<String, Value>) -> Option<Extraction> {
    let message = obj.get("message")?.as_object()?;
    if message.get("role").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    content_text(message.get("content")?).map(Extraction::Final)
}

fn completed_agent_message(obj: &Map<String, Value>) -> Option<Extraction> {
    if obj.get("type").and_then(Value::as_str) != Some("item.completed") {
        return None;
    }
    let item = obj.get("item")?.as_object()?;
    if item.get("type").and_then(Value::as_str) != Some("agent_message") {
        return None;
    }
    content_text(item.get("text")?).map(Extraction::Final)
}

fn field_final(obj: &Map<String, Value>, key: &str) -> Option<Extraction> {
    content_text(obj.get(key)?).map(Extraction::Final)
}

fn final_message_field(obj: &Map<String, Value>) -> Option<Extraction> {
    field_final(obj, "final_message")
}

fn result_field(obj: &Map<String, Value>) -> Option<Extraction> {
    field_final(obj, "result")
}

fn output_field(obj: &Map<String, Value>) -> Option<Extraction> {
    field_final(obj, "output")
}

fn text_field(obj: &Map<String, Value>) -> Option<Extraction> {
    field_final(obj, "text")
}

fn response_field(obj: &Map<String, Value>) -> Option<Extraction> {
    field_final(obj, "response")
}

/// `content`, or a stream-json chunk when flagged with `"delta": true`
fn content_field(obj: &Map<String, Value>) -> Option<Extraction> {
    let text = content_text(obj.get("content")?)?;
    if obj.get("delta").and_then(Value::as_bool) == Some(true) {
        Some(Extraction::Fragment(text))
    } else {
        Some(Extraction::Final(text))
    }
}

fn first_choice(obj: &Map<String, Value>) -> Option<Extraction> {
    let content = obj
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;
    content_text(content).map(Extraction::Final)
}

/// Plain-text answer used when no structured shape was recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Every unstructured line, in order (one-shot processes)
    AllUnstructured,

    /// The last non-empty raw line (daemons)
    LastRawLine,
}

impl Fallback {
    /// Fallback policy for a transport mode
    pub fn for_mode(mode: TransportMode) -> Self {
        if mode.is_persistent() {
            Self::LastRawLine
        } else {
            Self::AllUnstructured
        }
    }
}

/// Folds the output lines of one response
#[derive(Debug, Clone)]
pub struct ResponseAccumulator {
    fallback: Fallback,
    final_text: Option<String>,
    fragments: String,
    saw_fragment: bool,
    yielded: bool,
    unstructured: Vec<String>,
    last_raw: Option<String>,
    raw: String,
}

impl ResponseAccumulator {
    /// Create an empty accumulator
    pub fn new(fallback: Fallback) -> Self {
        Self {
            fallback,
            final_text: None,
            fragments: String::new(),
            saw_fragment: false,
            yielded: false,
            unstructured: Vec::new(),
            last_raw: None,
            raw: String::new(),
        }
    }

    /// Create an accumulator with the fallback policy of `mode`
    pub fn for_mode(mode: TransportMode) -> Self {
        Self::new(Fallback::for_mode(mode))
    }

    /// Feed one raw line
    ///
    /// Returns the fragment a stream should yield for this line, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UpstreamError`] when the line is an error object.
    pub fn push(&mut self, line: &str) -> Result<Option<Fragment>> {
        self.raw.push_str(line);
        self.raw.push('\n');
        if !line.trim().is_empty() {
            self.last_raw = Some(line.to_string());
        }

        match ResponseExtractor::extract(line) {
            Extraction::Fragment(text) => {
                self.fragments.push_str(&text);
                self.saw_fragment = true;
                self.yielded = true;
                Ok(Some(Fragment::delta(text)))
            }
            Extraction::Final(text) => {
                self.final_text = Some(text.clone());
                if self.saw_fragment {
                    return Ok(None);
                }
                self.yielded = true;
                Ok(Some(Fragment::delta(text)))
            }
            Extraction::Unstructured(text) => {
                self.unstructured.push(text);
                Ok(None)
            }
            Extraction::Nothing => {
                // Keeps paragraph breaks of plain-text output
                if line.trim().is_empty() && !self.unstructured.is_empty() {
                    self.unstructured.push(String::new());
                }
                Ok(None)
            }
            Extraction::UpstreamError(message) => Err(BridgeError::UpstreamError(message)),
        }
    }

    /// Whether a fragment or final answer has been seen
    pub fn has_content(&self) -> bool {
        self.saw_fragment || self.final_text.is_some()
    }

    /// The last non-empty raw line seen
    pub fn last_raw_line(&self) -> Option<&str> {
        self.last_raw.as_deref()
    }

    fn fallback_text(&self) -> Option<String> {
        let text = match self.fallback {
            Fallback::AllUnstructured => self.unstructured.join("\n"),
            Fallback::LastRawLine => self.last_raw.clone().unwrap_or_default(),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Output that is one JSON document spread over several lines
    fn whole_document(&self) -> Result<Option<String>> {
        let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(self.raw.trim()) else {
            return Ok(None);
        };
        match ResponseExtractor::extract_object(&obj) {
            Extraction::Final(text) | Extraction::Fragment(text) => Ok(Some(text)),
            Extraction::UpstreamError(message) => Err(BridgeError::UpstreamError(message)),
            _ => Ok(None),
        }
    }

    /// The fragment a stream yields at its end when it yielded nothing else
    pub fn stream_fallback(&self) -> Option<Fragment> {
        if self.yielded {
            return None;
        }
        self.fallback_text().map(Fragment::delta)
    }

    /// Aggregated answer, trimmed
    ///
    /// Preference order: the last final answer, the concatenated fragments, a
    /// multi-line JSON document, then the plain-text fallback.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MalformedResponse`] when none of those produced text.
    pub fn finish(&self) -> Result<String> {
        let answer = match &self.final_text {
            Some(text) => Some(text.clone()),
            None if self.saw_fragment => Some(self.fragments.clone()),
            None => match self.whole_document()? {
                Some(text) => Some(text),
                None => self.fallback_text(),
            },
        };

        answer
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                BridgeError::MalformedResponse("no answer found in assistant output".to_string())
            })
    }
}
