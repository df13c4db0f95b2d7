//! Process management for assistant subprocesses

use crate::error::{Result, TransportError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for spawning an assistant process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Program to execute (first argv element)
    pub program: String,

    /// Arguments to pass to the program
    pub args: Vec<String>,

    /// Environment variables to set
    pub env: HashMap<String, String>,

    /// Whether to start from an empty environment
    pub clear_env: bool,

    /// Working directory
    pub working_dir: Option<PathBuf>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ProcessConfig {
    /// Create a new process configuration
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            clear_env: false,
            working_dir: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Build from a tokenized command line
    pub fn from_argv(argv: Vec<String>) -> Result<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| TransportError::Config("command is empty".to_string()))?;
        Ok(Self {
            args: argv.collect(),
            ..Self::new(program)
        })
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set environment variables
    pub fn with_envs(mut self, env: &HashMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Start children from an empty environment
    ///
    /// # Security Note
    ///
    /// When set, only the variables explicitly configured are passed to the
    /// child. Most assistant CLIs need `HOME` and `PATH`, so this is off by
    /// default.
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// A command for this configuration
    ///
    /// Children are always killed when their handle is dropped.
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if self.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.kill_on_drop(true);
        cmd
    }
}

/// Read one line, replacing invalid UTF-8 and stripping the terminator
///
/// Returns `Ok(None)` at end of stream.
pub(crate) async fn read_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Forward a child's stderr to the log
pub(crate) fn log_stderr(
    stderr: tokio::process::ChildStderr,
    program: String,
    pid: Option<u32>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        while let Ok(Some(line)) = read_line_lossy(&mut reader, &mut buf).await {
            if !line.trim().is_empty() {
                debug!(program = %program, pid = ?pid, "stderr: {}", line);
            }
        }
    })
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!(pid, "SIGTERM failed: {}", e);
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> bool {
    false
}

/// Ask a child to exit, killing it once the grace period runs out
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    if let Some(pid) = child.id()
        && send_sigterm(pid)
        && tokio::time::timeout(grace, child.wait()).await.is_ok()
    {
        return Ok(());
    }

    child
        .kill()
        .await
        .map_err(|e| TransportError::Process(format!("Failed to kill process: {}", e)))
}

/// Handle to a running persistent assistant process
///
/// A background task owns stdout and forwards every line over a channel, so
/// reads can be bounded by a deadline even though pipe reads have no timeout
/// of their own. When a wait times out nothing is lost: the line stays queued.
pub struct ProcessHandle {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
    reader: JoinHandle<()>,
    stderr: Option<JoinHandle<()>>,
    pid: Option<u32>,
    config: ProcessConfig,
}

impl ProcessHandle {
    /// Spawn a new assistant process with piped stdio
    pub fn spawn(config: ProcessConfig) -> Result<Self> {
        let mut cmd = config.command();
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::spawn_failed(&config.program, e))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .map(|stderr| log_stderr(stderr, config.program.clone(), pid));

        let (tx, lines) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                match read_line_lossy(&mut reader, &mut buf).await {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(pid = ?pid, "daemon stdout read failed: {}", e);
                        break;
                    }
                }
            }
        });

        debug!(program = %config.program, pid = ?pid, "daemon process spawned");

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            lines,
            reader,
            stderr,
            pid,
            config,
        })
    }

    /// Write one line to the process, adding the newline if missing
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            self.stdin.write_all(b"\n").await?;
        }
        self.stdin.flush().await?;
        Ok(())
    }

    /// Receive the next output line, waiting no later than `deadline`
    ///
    /// Returns `Ok(None)` once the process has closed its output.
    pub async fn recv_line(&mut self, deadline: Instant) -> Result<Option<String>> {
        match tokio::time::timeout_at(deadline, self.lines.recv()).await {
            Ok(line) => Ok(line),
            Err(_) => Err(TransportError::Timeout(self.config.timeout)),
        }
    }

    /// Discard output left over from an earlier, abandoned request
    pub fn drain_stale(&mut self) -> usize {
        let mut drained = 0;
        while self.lines.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    /// Check if the process is still alive
    pub fn is_alive(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Stop the process (SIGTERM, then kill after `grace`)
    pub async fn terminate(&mut self, grace: Duration) -> Result<()> {
        let result = terminate(&mut self.child, grace).await;
        self.reader.abort();
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        result
    }

    /// OS process id, if the process has not been reaped
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Get the process configuration
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // The child itself is killed by kill_on_drop.
        self.reader.abort();
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
    }
}
