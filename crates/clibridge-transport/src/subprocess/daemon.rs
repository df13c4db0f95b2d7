//! Stdio daemon transport
//!
//! One long-lived assistant process speaks the daemon line protocol over its
//! stdin/stdout. Requests are serialized: the exchange returned by
//! [`StdioDaemonTransport::send`] holds the process until it is dropped, so two
//! responses can never interleave on the shared pipe.

use super::process::{ProcessConfig, ProcessHandle};
use crate::config::{TransportConfig, TransportMode};
use crate::error::{Result, TransportError};
use crate::state::DaemonState;
use crate::traits::{Exchange, LineReceiver, ProcessTransport, TransportRequest};
use async_trait::async_trait;
use clibridge_protocol::DaemonRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Time a daemon gets to exit after SIGTERM before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Published outside the slot lock so `state()` never waits on a request
type StateCell = Arc<watch::Sender<DaemonState>>;

struct DaemonSlot {
    state: StateCell,
    handle: Option<ProcessHandle>,
}

impl DaemonSlot {
    fn set(&self, state: DaemonState) {
        self.state.send_replace(state);
    }

    fn fail(&mut self) {
        self.set(DaemonState::Failed);
        self.handle = None;
    }

    /// Start the process unless a live one is already attached
    fn ensure_running(&mut self, config: &ProcessConfig) -> Result<&mut ProcessHandle> {
        if let Some(handle) = self.handle.as_mut()
            && !handle.is_alive()
        {
            warn!(program = %config.program, pid = ?handle.pid(), "daemon exited, restarting");
            self.fail();
        }

        if self.handle.is_none() {
            self.set(DaemonState::Starting);
            match ProcessHandle::spawn(config.clone()) {
                Ok(handle) => {
                    debug!(program = %config.program, pid = ?handle.pid(), state = %DaemonState::Ready, "daemon started");
                    self.handle = Some(handle);
                    self.set(DaemonState::Ready);
                }
                Err(e) => {
                    self.set(DaemonState::Failed);
                    return Err(e);
                }
            }
        }

        self.handle
            .as_mut()
            .ok_or_else(|| TransportError::Process("daemon not running".to_string()))
    }
}

/// Persistent process over standard pipes
pub struct StdioDaemonTransport {
    process: ProcessConfig,
    slot: Arc<Mutex<DaemonSlot>>,
    state: StateCell,
}

impl StdioDaemonTransport {
    /// Create the transport; the daemon is started lazily on first use
    pub fn new(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        let process = ProcessConfig::from_argv(config.argv()?)?
            .with_envs(&config.env)
            .with_timeout(config.timeout());
        let (state, _) = watch::channel(DaemonState::NotStarted);
        let state = Arc::new(state);
        Ok(Self {
            process,
            slot: Arc::new(Mutex::new(DaemonSlot {
                state: Arc::clone(&state),
                handle: None,
            })),
            state,
        })
    }

    /// OS process id of the running daemon
    pub async fn pid(&self) -> Option<u32> {
        self.slot.lock().await.handle.as_ref().and_then(|h| h.pid())
    }
}

#[async_trait]
impl ProcessTransport for StdioDaemonTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::DaemonStdio
    }

    async fn start(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        slot.ensure_running(&self.process).map(|_| ())
    }

    async fn send(&self, request: &TransportRequest) -> Result<Exchange> {
        let mut slot = self.slot.clone().lock_owned().await;
        let deadline = Instant::now() + self.process.timeout;
        let line = DaemonRequest::chat(&request.model, &request.prompt).to_line()?;

        let handle = slot.ensure_running(&self.process)?;
        let stale = handle.drain_stale();
        if stale > 0 {
            warn!(pid = ?handle.pid(), stale, "discarded daemon output from an abandoned request");
        }

        if let Err(e) = handle.send_line(&line).await {
            warn!(pid = ?handle.pid(), "daemon write failed: {}", e);
            slot.fail();
            return Err(e);
        }

        slot.set(DaemonState::Busy);
        Ok(Box::new(StdioExchange {
            slot,
            deadline,
        }))
    }

    async fn is_alive(&self) -> bool {
        // A busy daemon is held by its exchange; EOF there moves it to Failed
        if *self.state.borrow() == DaemonState::Busy {
            return true;
        }
        let mut slot = self.slot.lock().await;
        slot.handle.as_mut().is_some_and(|h| h.is_alive())
    }

    async fn state(&self) -> Option<DaemonState> {
        Some(*self.state.borrow())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let result = match slot.handle.take() {
            Some(mut handle) => {
                debug!(pid = ?handle.pid(), "stopping daemon");
                handle.terminate(SHUTDOWN_GRACE).await
            }
            None => Ok(()),
        };
        slot.set(DaemonState::NotStarted);
        result
    }
}

/// One request's view of the daemon's output
///
/// Holds the daemon lock for as long as it lives.
struct StdioExchange {
    slot: OwnedMutexGuard<DaemonSlot>,
    deadline: Instant,
}

#[async_trait]
impl LineReceiver for StdioExchange {
    async fn receive_line(&mut self) -> Result<Option<String>> {
        let Some(handle) = self.slot.handle.as_mut() else {
            return Ok(None);
        };

        match handle.recv_line(self.deadline).await {
            Ok(None) => {
                warn!(pid = ?handle.pid(), "daemon closed its output mid-request");
                self.slot.fail();
                Ok(None)
            }
            other => other,
        }
    }
}

impl Drop for StdioExchange {
    fn drop(&mut self) {
        if *self.slot.state.borrow() == DaemonState::Busy {
            self.slot.set(DaemonState::Ready);
        }
    }
}
