//! Exec transport: one process per request
//!
//! The prompt goes in on stdin (or as the last argument), output lines come back
//! as the process writes them, and the exit status is checked once stdout
//! closes. Nothing is shared between calls, so requests run fully in parallel.

use super::process::{ProcessConfig, read_line_lossy};
use crate::config::{PromptInput, TransportConfig, TransportMode};
use crate::error::{Result, TransportError};
use crate::traits::{Exchange, LineReceiver, ProcessTransport, TransportRequest};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Spawn-per-call transport
#[derive(Debug, Clone)]
pub struct ExecTransport {
    process: ProcessConfig,
    prompt_input: PromptInput,
}

impl ExecTransport {
    /// Create an exec transport from a validated configuration
    pub fn new(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        let process = ProcessConfig::from_argv(config.argv()?)?
            .with_envs(&config.env)
            .with_timeout(config.timeout());
        Ok(Self {
            process,
            prompt_input: config.prompt_input,
        })
    }

    /// The process configuration used for every call
    pub fn process_config(&self) -> &ProcessConfig {
        &self.process
    }
}

#[async_trait]
impl ProcessTransport for ExecTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Exec
    }

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn send(&self, request: &TransportRequest) -> Result<Exchange> {
        let deadline = Instant::now() + self.process.timeout;

        let mut cmd = self.process.command();
        match self.prompt_input {
            PromptInput::Arg => {
                cmd.arg(&request.prompt);
                cmd.stdin(Stdio::null());
            }
            PromptInput::Stdin => {
                cmd.stdin(Stdio::piped());
            }
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| TransportError::spawn_failed(&self.process.program, e))?;
        debug!(program = %self.process.program, pid = ?child.id(), "exec process spawned");

        // Written from a task so a process that emits output before draining its
        // input cannot deadlock against us.
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    debug!("prompt write to exec stdin failed: {}", e);
                    return;
                }
                if let Err(e) = stdin.shutdown().await {
                    debug!("closing exec stdin failed: {}", e);
                }
            });
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Process("Failed to get stdout".to_string()))?;
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("reading exec stderr failed: {}", e);
                }
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(Box::new(ExecExchange {
            child,
            stdout: BufReader::new(stdout),
            stderr,
            buf: Vec::new(),
            captured: String::new(),
            deadline,
            timeout: self.process.timeout,
            finished: false,
        }))
    }

    async fn is_alive(&self) -> bool {
        true
    }
}

/// Output of one exec process
struct ExecExchange {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    buf: Vec<u8>,
    captured: String,
    deadline: Instant,
    timeout: Duration,
    finished: bool,
}

impl ExecExchange {
    async fn finish(&mut self) -> Result<()> {
        self.finished = true;

        let status = tokio::time::timeout_at(self.deadline, self.child.wait())
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))??;

        let stderr = match self.stderr.take() {
            Some(task) => tokio::time::timeout_at(self.deadline, task)
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))?
                .unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            return Ok(());
        }

        let message = [stderr.trim(), self.captured.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match status.code() {
                Some(code) => format!("process exited with status {}", code),
                None => "process terminated by signal".to_string(),
            });

        debug!(code = ?status.code(), "exec process failed");
        Err(TransportError::NonZeroExit {
            code: status.code(),
            message,
        })
    }
}

#[async_trait]
impl LineReceiver for ExecExchange {
    async fn receive_line(&mut self) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        let line = tokio::time::timeout_at(
            self.deadline,
            read_line_lossy(&mut self.stdout, &mut self.buf),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.timeout))??;

        match line {
            Some(line) => {
                self.captured.push_str(&line);
                self.captured.push('\n');
                Ok(Some(line))
            }
            None => {
                self.finish().await?;
                Ok(None)
            }
        }
    }
}
