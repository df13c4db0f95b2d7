//! Socket daemon transport
//!
//! A persistent assistant listens on a Unix domain socket. Every request opens
//! a fresh connection, writes one JSON line, and reads a single line back.
//! If the socket is missing the daemon command is started and the path polled
//! until it shows up.

use crate::config::{TransportConfig, TransportMode};
use crate::error::{Result, TransportError};
use crate::state::DaemonState;
use crate::subprocess::ProcessConfig;
use crate::subprocess::process::{log_stderr, terminate};
use crate::traits::{Exchange, LineReceiver, ProcessTransport, TransportRequest};
use async_trait::async_trait;
use clibridge_protocol::DaemonRequest;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Largest response line accepted from a socket daemon
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Interval between socket-path and connection attempts while a daemon warms up
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct Launcher {
    state: DaemonState,
    child: Option<Child>,
    stderr: Option<JoinHandle<()>>,
}

impl Launcher {
    fn owns_live_child(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }
}

/// Persistent process behind a local socket
pub struct SocketDaemonTransport {
    process: ProcessConfig,
    socket_path: PathBuf,
    launcher: Mutex<Launcher>,
    in_flight: Arc<AtomicUsize>,
}

impl SocketDaemonTransport {
    /// Create the transport; nothing is started until the first request
    pub fn new(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        let socket_path = config
            .socket_path
            .clone()
            .ok_or_else(|| TransportError::Config("socket mode requires a socket path".to_string()))?;
        let process = ProcessConfig::from_argv(config.argv()?)?
            .with_envs(&config.env)
            .with_timeout(config.timeout());
        Ok(Self {
            process,
            socket_path,
            launcher: Mutex::new(Launcher {
                state: DaemonState::NotStarted,
                child: None,
                stderr: None,
            }),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The socket this transport talks to
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Make sure the socket exists, starting the daemon if needed
    async fn ensure_socket(&self, deadline: Instant) -> Result<()> {
        let mut launcher = self.launcher.lock().await;
        if self.socket_path.exists() {
            launcher.state = DaemonState::Ready;
            return Ok(());
        }
        self.launch(&mut launcher, deadline).await
    }

    /// Spawn the daemon unless the one we own is still running, then wait for its socket
    async fn launch(&self, launcher: &mut Launcher, deadline: Instant) -> Result<()> {
        if !launcher.owns_live_child() {
            launcher.state = DaemonState::Starting;
            let mut cmd = self.process.command();
            cmd.stdin(Stdio::null());
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::piped());

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    launcher.state = DaemonState::Failed;
                    return Err(TransportError::spawn_failed(&self.process.program, e));
                }
            };
            let pid = child.id();
            debug!(
                program = %self.process.program,
                pid = ?pid,
                socket = %self.socket_path.display(),
                "socket daemon spawned"
            );
            if let Some(stderr) = launcher.stderr.take() {
                stderr.abort();
            }
            launcher.stderr = child
                .stderr
                .take()
                .map(|stderr| log_stderr(stderr, self.process.program.clone(), pid));
            launcher.child = Some(child);
        }

        while !self.socket_path.exists() {
            if Instant::now() + POLL_INTERVAL > deadline {
                warn!(socket = %self.socket_path.display(), "daemon socket never appeared");
                launcher.state = DaemonState::Failed;
                return Err(TransportError::Timeout(self.process.timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        launcher.state = DaemonState::Ready;
        Ok(())
    }

    /// Replace a socket nobody listens on with a freshly started daemon
    ///
    /// Returns `false` when the daemon we own is still running, i.e. it is
    /// merely not accepting yet.
    async fn relaunch_stale(&self, deadline: Instant) -> Result<bool> {
        let mut launcher = self.launcher.lock().await;
        if launcher.owns_live_child() {
            return Ok(false);
        }

        warn!(socket = %self.socket_path.display(), "removing stale daemon socket");
        if let Err(e) = std::fs::remove_file(&self.socket_path)
            && e.kind() != ErrorKind::NotFound
        {
            launcher.state = DaemonState::Failed;
            return Err(e.into());
        }
        self.launch(&mut launcher, deadline).await?;
        Ok(true)
    }

    /// Connect, retrying while a freshly started daemon is not yet listening
    async fn connect(&self, deadline: Instant) -> Result<UnixStream> {
        let mut relaunched = false;
        loop {
            match UnixStream::connect(&self.socket_path).await {
                Ok(stream) => return Ok(stream),
                Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound) => {
                    if !relaunched && self.relaunch_stale(deadline).await? {
                        relaunched = true;
                        continue;
                    }
                    if Instant::now() + POLL_INTERVAL > deadline {
                        return Err(TransportError::Timeout(self.process.timeout));
                    }
                    debug!(socket = %self.socket_path.display(), "daemon not accepting yet: {}", e);
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    return Err(TransportError::Connection(format!(
                        "{}: {}",
                        self.socket_path.display(),
                        e
                    )));
                }
            }
        }
    }

    async fn round_trip(&self, line: &str, deadline: Instant) -> Result<String> {
        self.ensure_socket(deadline).await?;
        let mut stream = self.connect(deadline).await?;

        let exchange = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;
            read_frame(&mut stream).await
        };

        tokio::time::timeout_at(deadline, exchange)
            .await
            .map_err(|_| TransportError::Timeout(self.process.timeout))?
    }

    async fn mark(&self, state: DaemonState) {
        self.launcher.lock().await.state = state;
    }
}

/// Read one response line, capped at [`MAX_FRAME_BYTES`]
async fn read_frame(stream: &mut UnixStream) -> Result<String> {
    let mut reader = BufReader::new(stream).take(MAX_FRAME_BYTES as u64 + 1);
    let mut buf = Vec::new();
    reader.read_until(b'\n', &mut buf).await?;

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    if buf.len() > MAX_FRAME_BYTES {
        return Err(TransportError::MalformedResponse(format!(
            "daemon response exceeds {} bytes",
            MAX_FRAME_BYTES
        )));
    }

    let line = String::from_utf8_lossy(&buf).into_owned();
    if line.trim().is_empty() {
        return Err(TransportError::MalformedResponse(
            "empty response from daemon".to_string(),
        ));
    }
    Ok(line)
}

/// Decrements the in-flight counter when a request finishes either way
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessTransport for SocketDaemonTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::DaemonSocket
    }

    async fn start(&self) -> Result<()> {
        self.ensure_socket(Instant::now() + self.process.timeout).await
    }

    async fn send(&self, request: &TransportRequest) -> Result<Exchange> {
        let deadline = Instant::now() + self.process.timeout;
        let line = DaemonRequest::chat(&request.model, &request.prompt).to_line()?;

        let _in_flight = InFlight::enter(&self.in_flight);
        match self.round_trip(&line, deadline).await {
            Ok(response) => Ok(Box::new(SocketExchange {
                line: Some(response),
            })),
            Err(e) => {
                if !matches!(e, TransportError::MalformedResponse(_)) {
                    self.mark(DaemonState::Failed).await;
                }
                Err(e)
            }
        }
    }

    async fn is_alive(&self) -> bool {
        self.socket_path.exists()
    }

    async fn state(&self) -> Option<DaemonState> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return Some(DaemonState::Busy);
        }
        Some(self.launcher.lock().await.state)
    }

    async fn shutdown(&self) -> Result<()> {
        let mut launcher = self.launcher.lock().await;
        let mut result = Ok(());
        if let Some(mut child) = launcher.child.take() {
            debug!(pid = ?child.id(), "stopping socket daemon");
            result = terminate(&mut child, SHUTDOWN_GRACE).await;
            if let Err(e) = std::fs::remove_file(&self.socket_path)
                && e.kind() != ErrorKind::NotFound
            {
                warn!(socket = %self.socket_path.display(), "failed to remove daemon socket: {}", e);
            }
        }
        if let Some(stderr) = launcher.stderr.take() {
            stderr.abort();
        }
        launcher.state = DaemonState::NotStarted;
        result
    }
}

/// The single response line of a socket request
struct SocketExchange {
    line: Option<String>,
}

#[async_trait]
impl LineReceiver for SocketExchange {
    async fn receive_line(&mut self) -> Result<Option<String>> {
        Ok(self.line.take())
    }
}
