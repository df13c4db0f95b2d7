//! Transport configuration
//!
//! A [`TransportConfig`] is immutable once a transport has been built from it.
//! Validation happens at build time so a bad command line fails at service
//! start rather than on the first request.

use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How prompts reach the external assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// A fresh process per request
    Exec,

    /// One persistent process, JSON lines over stdin/stdout
    DaemonStdio,

    /// One persistent process, JSON lines over a local socket
    DaemonSocket,
}

impl TransportMode {
    /// Whether requests share one long-lived process
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Exec)
    }

    /// Whether the response ends at the first line carrying content
    ///
    /// A stdio daemon never closes its output between requests, so the first
    /// recognized line is the answer.
    pub fn stops_at_first_content(&self) -> bool {
        matches!(self, Self::DaemonStdio)
    }

    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::DaemonStdio => "daemon_stdio",
            Self::DaemonSocket => "daemon_socket",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exec" => Ok(Self::Exec),
            "daemon" | "daemon_stdio" | "stdio" => Ok(Self::DaemonStdio),
            "daemon_socket" | "socket" => Ok(Self::DaemonSocket),
            other => Err(TransportError::Config(format!(
                "unknown transport mode '{}' (expected exec, daemon_stdio or daemon_socket)",
                other
            ))),
        }
    }
}

/// Where an exec-mode prompt is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptInput {
    /// Written to the process's standard input, which is then closed
    #[default]
    Stdin,

    /// Appended as the final command-line argument
    Arg,
}

impl FromStr for PromptInput {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdin" => Ok(Self::Stdin),
            "arg" => Ok(Self::Arg),
            other => Err(TransportError::Config(format!(
                "unknown prompt input '{}' (expected stdin or arg)",
                other
            ))),
        }
    }
}

/// Configuration for one assistant transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport strategy
    pub mode: TransportMode,

    /// Exec-mode command line (shell-word template)
    pub command: String,

    /// Command line that starts the daemon (both daemon modes)
    pub daemon_command: String,

    /// Socket path for [`TransportMode::DaemonSocket`]
    pub socket_path: Option<PathBuf>,

    /// Per-request timeout in seconds (must be positive)
    pub timeout_secs: u64,

    /// Exec-mode prompt delivery
    pub prompt_input: PromptInput,

    /// Extra environment variables for spawned processes
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Exec,
            command: String::new(),
            daemon_command: String::new(),
            socket_path: None,
            timeout_secs: 120,
            prompt_input: PromptInput::Stdin,
            env: HashMap::new(),
        }
    }
}

impl TransportConfig {
    /// Exec-mode configuration
    pub fn exec(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    /// Stdio daemon configuration
    pub fn daemon_stdio(daemon_command: impl Into<String>) -> Self {
        Self {
            mode: TransportMode::DaemonStdio,
            daemon_command: daemon_command.into(),
            ..Default::default()
        }
    }

    /// Socket daemon configuration
    pub fn daemon_socket(daemon_command: impl Into<String>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: TransportMode::DaemonSocket,
            daemon_command: daemon_command.into(),
            socket_path: Some(socket_path.into()),
            ..Default::default()
        }
    }

    /// Set the timeout in seconds
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the exec-mode prompt delivery
    pub fn with_prompt_input(mut self, input: PromptInput) -> Self {
        self.prompt_input = input;
        self
    }

    /// Set an environment variable for spawned processes
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The command line used by the configured mode
    pub fn active_command(&self) -> &str {
        match self.mode {
            TransportMode::Exec => &self.command,
            TransportMode::DaemonStdio | TransportMode::DaemonSocket => &self.daemon_command,
        }
    }

    /// Tokenize the active command line into argv
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when quoting is unbalanced or the
    /// command is empty.
    pub fn argv(&self) -> Result<Vec<String>> {
        tokenize(self.active_command())
    }

    /// Check every invariant the transports rely on
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(TransportError::Config(
                "timeout must be a positive number of seconds".to_string(),
            ));
        }
        self.argv()?;
        if self.mode == TransportMode::DaemonSocket
            && self
                .socket_path
                .as_ref()
                .is_none_or(|p| p.as_os_str().is_empty())
        {
            return Err(TransportError::Config(
                "socket mode requires a socket path".to_string(),
            ));
        }
        Ok(())
    }
}

/// Split a command line using POSIX shell-word rules
pub fn tokenize(command: &str) -> Result<Vec<String>> {
    let argv = shlex::split(command).ok_or_else(|| {
        TransportError::Config(format!("unbalanced quoting in command '{}'", command))
    })?;
    if argv.is_empty() {
        return Err(TransportError::Config("command is empty".to_string()));
    }
    Ok(argv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_tokenize_respects_quotes() {
        let argv = tokenize(r#"codex exec --json "--flag with space" -"#).unwrap();
        assert_eq!(argv, vec!["codex", "exec", "--json", "--flag with space", "-"]);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("codex 'unterminated")]
    fn test_tokenize_rejects(#[case] command: &str) {
        assert!(matches!(tokenize(command), Err(TransportError::Config(_))));
    }

    #[rstest]
    #[case("exec", TransportMode::Exec)]
    #[case("daemon", TransportMode::DaemonStdio)]
    #[case("daemon_stdio", TransportMode::DaemonStdio)]
    #[case("DAEMON_SOCKET", TransportMode::DaemonSocket)]
    fn test_mode_parsing(#[case] raw: &str, #[case] expected: TransportMode) {
        assert_eq!(raw.parse::<TransportMode>().unwrap(), expected);
    }

    #[test]
    fn test_validate_fails_fast() {
        assert!(TransportConfig::exec("").validate().is_err());
        assert!(TransportConfig::exec("cat").with_timeout_secs(0).validate().is_err());
        assert!(
            TransportConfig::daemon_stdio("")
                .validate()
                .is_err()
        );

        let mut socket = TransportConfig::daemon_socket("codex daemon", "/tmp/x.sock");
        assert!(socket.validate().is_ok());
        socket.socket_path = None;
        assert!(socket.validate().is_err());
    }

    #[test]
    fn test_active_command_follows_mode() {
        let mut config = TransportConfig::exec("codex exec -");
        config.daemon_command = "codex daemon --stdio".into();
        assert_eq!(config.argv().unwrap()[1], "exec");
        config.mode = TransportMode::DaemonStdio;
        assert_eq!(config.argv().unwrap()[1], "daemon");
    }
}
