//! Provider-agnostic entry point
//!
//! [`BridgeFacade`] owns one [`ChatClient`] per provider and adapts their
//! output to what an HTTP layer sends: an aggregated completion object or a
//! stream of server-sent-event frames.
//!
//! Two streaming dialects are produced:
//!
//! ```text
//! OpenAI-compatible                      native
//! data: {"object":"chat.completion.chunk",...}   data: {"type":"delta","content":"Hi"}
//! data: [DONE]                           data: {"type":"done","answer":"Hi",...}
//! ```

use crate::client::ChatClient;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, ErrorKind};
use clibridge_protocol::{
    ChatCompletion, ChatCompletionChunk, CompletionRequest, Fragment, FragmentKind, ModelCard,
    ModelList, NativeAnswer, NativeEvent, completion_id,
};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Terminal frame of an OpenAI-compatible stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Stream of ready-to-send SSE frames
pub type SseStream = BoxStream<'static, String>;

/// Errors surfaced to the HTTP boundary
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// The request named a provider that is not configured
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// The request is unusable as sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The assistant could not produce an answer
    #[error("assistant unavailable ({kind}): {message}")]
    Unavailable {
        /// What went wrong upstream
        kind: ErrorKind,
        /// Human-readable failure
        message: String,
    },
}

impl FacadeError {
    /// HTTP status for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownProvider(_) | Self::InvalidRequest(_) => 400,
            Self::Unavailable { .. } => 503,
        }
    }

    /// Upstream error kind, for failures that reached the assistant
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Unavailable { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<BridgeError> for FacadeError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::InvalidRequest(msg) => Self::InvalidRequest(msg),
            other => {
                warn!(kind = %other.kind(), action = other.suggested_action(), "assistant unavailable: {}", other);
                Self::Unavailable {
                    kind: other.kind(),
                    message: other.to_string(),
                }
            }
        }
    }
}

/// Result of [`BridgeFacade::complete`]
pub enum Completion {
    /// The whole answer
    Aggregated(ChatCompletion),
    /// OpenAI-compatible SSE frames, ending with [`DONE_FRAME`]
    Stream(SseStream),
}

/// Result of [`BridgeFacade::answer`]
pub enum NativeResponse {
    /// The whole answer
    Aggregated(NativeAnswer),
    /// Native SSE frames, ending with a `done` event
    Stream(SseStream),
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggregated(completion) => f.debug_tuple("Aggregated").field(completion).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl std::fmt::Debug for NativeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggregated(answer) => f.debug_tuple("Aggregated").field(answer).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Routes requests to the provider's chat client
#[derive(Debug, Clone)]
pub struct BridgeFacade {
    clients: Vec<ChatClient>,
    default_provider: String,
}

impl BridgeFacade {
    /// Build one client per configured provider
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] if any provider's transport is misconfigured.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let clients = config
            .providers
            .iter()
            .map(|p| ChatClient::new(&p.name, &p.model, &p.transport))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(providers = clients.len(), default = %config.default_provider, "bridge facade ready");
        Ok(Self {
            clients,
            default_provider: config.default_provider.clone(),
        })
    }

    /// Build from existing clients
    pub fn from_clients(default_provider: impl Into<String>, clients: Vec<ChatClient>) -> Self {
        Self {
            clients,
            default_provider: default_provider.into(),
        }
    }

    /// The client serving `provider` (or the default provider)
    pub fn client(&self, provider: Option<&str>) -> Result<&ChatClient, FacadeError> {
        let name = provider.unwrap_or(&self.default_provider);
        self.clients
            .iter()
            .find(|c| c.provider() == name)
            .ok_or_else(|| FacadeError::UnknownProvider(name.to_string()))
    }

    /// Answer an OpenAI-style completion request
    pub async fn complete(
        &self,
        provider: Option<&str>,
        request: CompletionRequest,
    ) -> Result<Completion, FacadeError> {
        let client = self.client(provider)?;
        request.validate().map_err(BridgeError::from)?;
        let model = request.model.clone().unwrap_or_else(|| client.model().to_string());

        if !request.streaming {
            let answer = client
                .chat_with_model(&request.turns, request.model.as_deref())
                .await?;
            return Ok(Completion::Aggregated(ChatCompletion::new(model, answer)));
        }

        let fragments = open_stream(client, &request).await?;
        let id = completion_id();
        let frames = fragments
            .map(move |item| match item {
                Ok(text) => sse_frame(&ChatCompletionChunk::new(&model, text).with_id(&id)),
                Err(e) => sse_frame(&json!({
                    "error": { "message": e.to_string(), "type": e.kind().as_str() }
                })),
            })
            .chain(stream::once(future::ready(DONE_FRAME.to_string())))
            .boxed();
        Ok(Completion::Stream(frames))
    }

    /// Answer a request from a caller that owns its own history
    ///
    /// `sources` and `conversation_id` are passed through untouched into the
    /// aggregated answer or the terminal `done` event.
    pub async fn answer(
        &self,
        provider: Option<&str>,
        request: CompletionRequest,
        sources: Option<Vec<Value>>,
        conversation_id: Option<String>,
    ) -> Result<NativeResponse, FacadeError> {
        let client = self.client(provider)?;
        request.validate().map_err(BridgeError::from)?;

        if !request.streaming {
            let answer = client
                .chat_with_model(&request.turns, request.model.as_deref())
                .await?;
            return Ok(NativeResponse::Aggregated(NativeAnswer {
                conversation_id,
                answer,
                sources,
            }));
        }

        let fragments = open_stream(client, &request).await?;
        let frames = stream::unfold(
            NativeStream::Streaming {
                fragments,
                answer: String::new(),
                sources,
                conversation_id,
            },
            NativeStream::advance,
        )
        .boxed();
        Ok(NativeResponse::Stream(frames))
    }

    /// One model card per provider
    pub fn list_models(&self) -> ModelList {
        ModelList::new(
            self.clients
                .iter()
                .map(|c| ModelCard::new(c.model(), format!("{}-cli", c.provider())))
                .collect(),
        )
    }

    /// Stop every provider's daemon
    ///
    /// All providers are attempted; the first failure is returned.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        let results = future::join_all(self.clients.iter().map(|c| c.shutdown())).await;
        results.into_iter().collect()
    }
}

type FramedFragments = BoxStream<'static, Result<String, BridgeError>>;

/// Start a stream and wait for its first item
///
/// A failure before anything was produced becomes a [`FacadeError`] rather
/// than an error frame. Word groups after the first get a leading space so the
/// framed texts concatenate back into the answer.
async fn open_stream(
    client: &ChatClient,
    request: &CompletionRequest,
) -> Result<FramedFragments, FacadeError> {
    let mut fragments = client.stream_chat_with_model(&request.turns, request.model.as_deref())?;
    let first = match fragments.next().await {
        Some(Err(e)) => return Err(e.into()),
        other => other,
    };

    Ok(stream::iter(first)
        .chain(fragments)
        .scan(Framing::default(), |framing, item| future::ready(framing.frame(item)))
        .boxed())
}

#[derive(Default)]
struct Framing {
    emitted: usize,
    failed: bool,
}

impl Framing {
    fn frame(&mut self, item: Result<Fragment, BridgeError>) -> Option<Result<String, BridgeError>> {
        if self.failed {
            return None;
        }
        match item {
            Ok(fragment) => {
                let text = if fragment.kind == FragmentKind::WordGroup && self.emitted > 0 {
                    format!(" {}", fragment.text)
                } else {
                    fragment.text
                };
                self.emitted += 1;
                Some(Ok(text))
            }
            Err(e) => {
                warn!(kind = %e.kind(), "stream failed after {} fragments: {}", self.emitted, e);
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

enum NativeStream {
    Streaming {
        fragments: FramedFragments,
        answer: String,
        sources: Option<Vec<Value>>,
        conversation_id: Option<String>,
    },
    Finished,
}

impl NativeStream {
    async fn advance(self) -> Option<(String, Self)> {
        let Self::Streaming {
            mut fragments,
            mut answer,
            sources,
            conversation_id,
        } = self
        else {
            return None;
        };

        match fragments.next().await {
            Some(Ok(text)) => {
                answer.push_str(&text);
                let frame = sse_frame(&NativeEvent::Delta { content: text });
                Some((
                    frame,
                    Self::Streaming {
                        fragments,
                        answer,
                        sources,
                        conversation_id,
                    },
                ))
            }
            Some(Err(e)) => {
                // The done event still follows the error
                let frame = sse_frame(&NativeEvent::Error {
                    message: e.to_string(),
                });
                let done = stream::empty().boxed();
                Some((
                    frame,
                    Self::Streaming {
                        fragments: done,
                        answer,
                        sources,
                        conversation_id,
                    },
                ))
            }
            None => {
                let frame = sse_frame(&NativeEvent::Done {
                    conversation_id,
                    answer: answer.trim().to_string(),
                    sources,
                });
                Some((frame, Self::Finished))
            }
        }
    }
}

/// Render one `data:` frame
fn sse_frame<T: Serialize>(payload: &T) -> String {
    match serde_json::to_string(payload) {
        Ok(json) => format!("data: {}\n\n", json),
        Err(e) => format!(
            "data: {}\n\n",
            json!({ "error": { "message": e.to_string(), "type": "serialization" } })
        ),
    }
}
