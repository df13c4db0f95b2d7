//! Chat client for one assistant provider

use crate::error::{BridgeError, Result};
use crate::extract::ResponseAccumulator;
use crate::prompt::PromptBuilder;
use crate::stream::{self, FragmentStream};
use clibridge_protocol::{ChatTurn, validate_turns};
use clibridge_transport::{
    DaemonState, ProcessTransport, TransportConfig, TransportError, TransportMode,
    TransportRequest, build_transport,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Talks to one provider's assistant through its configured transport
///
/// Cloning is cheap and clones share the transport, so a daemon stays single
/// even when the client is handed to several tasks.
#[derive(Clone)]
pub struct ChatClient {
    provider: String,
    model: String,
    transport: Arc<dyn ProcessTransport>,
    single_flight: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("mode", &self.transport.mode())
            .finish()
    }
}

impl ChatClient {
    /// Create a client, validating the transport configuration
    ///
    /// # Errors
    ///
    /// [`BridgeError::Config`] when the configuration is unusable.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        config: &TransportConfig,
    ) -> Result<Self> {
        let transport = build_transport(config)?;
        Ok(Self::with_transport(provider, model, transport))
    }

    /// Create a client over an already built transport
    pub fn with_transport(
        provider: impl Into<String>,
        model: impl Into<String>,
        transport: Arc<dyn ProcessTransport>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            transport,
            single_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Configured model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Transport strategy
    pub fn mode(&self) -> TransportMode {
        self.transport.mode()
    }

    /// Daemon lifecycle state (`None` for exec transports)
    pub async fn state(&self) -> Option<DaemonState> {
        self.transport.state().await
    }

    /// Stop the provider's daemon, if one is running
    pub async fn shutdown(&self) -> Result<()> {
        debug!(provider = %self.provider, "shutting down transport");
        self.transport.shutdown().await.map_err(BridgeError::from)
    }

    fn request(&self, turns: &[ChatTurn], model: Option<&str>) -> Result<TransportRequest> {
        validate_turns(turns)?;
        Ok(TransportRequest::new(
            model.unwrap_or(&self.model),
            PromptBuilder::build(turns),
        ))
    }

    /// Send a conversation and wait for the whole answer
    pub async fn chat(&self, turns: &[ChatTurn]) -> Result<String> {
        self.chat_with_model(turns, None).await
    }

    /// Like [`chat`](Self::chat), overriding the configured model
    pub async fn chat_with_model(&self, turns: &[ChatTurn], model: Option<&str>) -> Result<String> {
        let request = self.request(turns, model)?;
        complete(&self.provider, self.transport.as_ref(), &self.single_flight, request).await
    }

    /// Send a conversation and stream the answer
    ///
    /// Exec transports stream fragments as the process writes them. Daemon
    /// transports answer in one piece, which is then cut into word groups.
    /// The returned stream does nothing until it is polled.
    pub fn stream_chat(&self, turns: &[ChatTurn]) -> Result<FragmentStream> {
        self.stream_chat_with_model(turns, None)
    }

    /// Like [`stream_chat`](Self::stream_chat), overriding the configured model
    pub fn stream_chat_with_model(
        &self,
        turns: &[ChatTurn],
        model: Option<&str>,
    ) -> Result<FragmentStream> {
        let request = self.request(turns, model)?;
        debug!(provider = %self.provider, mode = %self.mode(), "starting stream");

        if !self.mode().is_persistent() {
            return Ok(stream::live(Arc::clone(&self.transport), request));
        }

        let client = self.clone();
        Ok(stream::synthesized(async move {
            complete(
                &client.provider,
                client.transport.as_ref(),
                &client.single_flight,
                request,
            )
            .await
        }))
    }
}

async fn complete(
    provider: &str,
    transport: &dyn ProcessTransport,
    single_flight: &Mutex<()>,
    request: TransportRequest,
) -> Result<String> {
    let mode = transport.mode();
    let _turn = if mode.is_persistent() {
        Some(single_flight.lock().await)
    } else {
        None
    };

    debug!(provider, mode = %mode, prompt_len = request.prompt.len(), "sending chat request");
    let mut exchange = transport.send(&request).await?;
    let mut acc = ResponseAccumulator::for_mode(mode);

    loop {
        match exchange.receive_line().await {
            Ok(Some(line)) => {
                acc.push(&line)?;
                if mode.stops_at_first_content() && acc.has_content() {
                    break;
                }
            }
            Ok(None) => break,
            Err(TransportError::Timeout(after)) if mode.is_persistent() => {
                return match acc.last_raw_line() {
                    Some(line) => {
                        warn!(provider, "daemon timed out; answering with its last output line");
                        Ok(line.trim().to_string())
                    }
                    None => Err(BridgeError::Timeout(after)),
                };
            }
            Err(e) => return Err(e.into()),
        }
    }

    let answer = acc.finish()?;
    debug!(provider, answer_len = answer.len(), "chat complete");
    Ok(answer)
}
