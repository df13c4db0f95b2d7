//! Bridge configuration
//!
//! Each provider is configured from variables prefixed with its upper-cased
//! name (`CODEX_*`, `GEMINI_*`). Unset variables fall back to defaults;
//! variables that are set but unparseable are errors naming the variable, so a
//! typo fails at start-up instead of being silently ignored.

use crate::error::{BridgeError, Result};
use clibridge_transport::{PromptInput, TransportConfig, TransportMode};
use std::env;
use std::path::PathBuf;

/// Providers configured by [`BridgeConfig::from_env`]
pub const KNOWN_PROVIDERS: &[&str] = &["codex", "gemini"];

/// Variable naming the provider used when a request names none
pub const DEFAULT_PROVIDER_VAR: &str = "CLIBRIDGE_DEFAULT_PROVIDER";

/// Configuration of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider name (`codex`, `gemini`)
    pub name: String,

    /// Model reported to callers and sent to daemons
    pub model: String,

    /// How the assistant process is reached
    pub transport: TransportConfig,
}

impl ProviderConfig {
    /// Provider with the built-in defaults for `name`
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (command, daemon_command) = default_commands(&name);
        let transport = TransportConfig {
            command,
            daemon_command,
            socket_path: Some(default_socket(&name)),
            ..TransportConfig::default()
        };
        Self {
            model: name.clone(),
            name,
            transport,
        }
    }

    /// Codex CLI defaults
    pub fn codex() -> Self {
        Self::new("codex")
    }

    /// Gemini CLI defaults
    pub fn gemini() -> Self {
        Self::new("gemini")
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replace the transport configuration
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Read `<NAME>_*` variables from the process environment
    pub fn from_env(name: &str) -> Result<Self> {
        Self::from_lookup(name, |key| env::var(key).ok())
    }

    /// Read `<NAME>_*` variables through `lookup`
    pub fn from_lookup(name: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let prefix = name.to_ascii_uppercase();
        let key = |suffix: &str| format!("{}_{}", prefix, suffix);
        let mut config = Self::new(name);

        if let Some(model) = lookup(&key("MODEL")) {
            config.model = model;
        }
        if let Some(command) = lookup(&key("CLI_CMD")) {
            config.transport.command = command;
        }
        if let Some(command) = lookup(&key("DAEMON_CMD")) {
            config.transport.daemon_command = command;
        }
        if let Some(path) = lookup(&key("DAEMON_SOCKET")) {
            config.transport.socket_path = Some(PathBuf::from(path));
        }
        if let Some(input) = lookup(&key("CLI_INPUT")) {
            config.transport.prompt_input = input
                .parse::<PromptInput>()
                .map_err(|e| invalid(&key("CLI_INPUT"), e))?;
        }
        if let Some(raw) = lookup(&key("TIMEOUT")) {
            config.transport.timeout_secs = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(BridgeError::Config(format!(
                        "{} must be a positive number of seconds, got '{}'",
                        key("TIMEOUT"),
                        raw
                    )));
                }
            };
        }

        let daemon_mode = lookup(&key("DAEMON_MODE"));
        config.transport.mode = match lookup(&key("MODE")) {
            None => TransportMode::Exec,
            Some(mode) if mode.trim().eq_ignore_ascii_case("daemon") => match daemon_mode {
                None => TransportMode::DaemonStdio,
                Some(refined) => match refined.trim().to_ascii_lowercase().as_str() {
                    "stdio" => TransportMode::DaemonStdio,
                    "socket" => TransportMode::DaemonSocket,
                    other => {
                        return Err(BridgeError::Config(format!(
                            "{} must be stdio or socket, got '{}'",
                            key("DAEMON_MODE"),
                            other
                        )));
                    }
                },
            },
            Some(mode) => mode
                .parse::<TransportMode>()
                .map_err(|e| invalid(&key("MODE"), e))?,
        };

        config
            .transport
            .validate()
            .map_err(|e| BridgeError::Config(format!("{}: {}", name, e)))?;
        Ok(config)
    }
}

fn invalid(var: &str, err: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(format!("{}: {}", var, err))
}

fn default_commands(name: &str) -> (String, String) {
    match name {
        "codex" => (
            "codex exec --json --skip-git-repo-check -".to_string(),
            "codex daemon --stdio".to_string(),
        ),
        "gemini" => (
            "gemini -o stream-json".to_string(),
            "gemini daemon --stdio".to_string(),
        ),
        other => (other.to_string(), format!("{} daemon --stdio", other)),
    }
}

fn default_socket(name: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/{}-daemon.sock", name))
}

/// Configuration of every provider the bridge serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Configured providers, in registration order
    pub providers: Vec<ProviderConfig>,

    /// Provider used when a request names none
    pub default_provider: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig::codex(), ProviderConfig::gemini()],
            default_provider: "codex".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Empty configuration with the given default provider
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Add (or replace) a provider
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.retain(|p| p.name != provider.name);
        self.providers.push(provider);
        self
    }

    /// Set the default provider
    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = name.into();
        self
    }

    /// Look up a provider by name
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Load every known provider from the process environment
    ///
    /// # Environment Variables
    ///
    /// Per provider `<P>` in `CODEX`, `GEMINI`:
    /// - `<P>_MODE`: `exec`, `daemon`, `daemon_stdio` or `daemon_socket`
    /// - `<P>_DAEMON_MODE`: `stdio` or `socket`, refines `daemon`
    /// - `<P>_CLI_CMD`, `<P>_CLI_INPUT` (`stdin` or `arg`)
    /// - `<P>_DAEMON_CMD`, `<P>_DAEMON_SOCKET`
    /// - `<P>_TIMEOUT` (seconds), `<P>_MODEL`
    ///
    /// Plus `CLIBRIDGE_DEFAULT_PROVIDER`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::new(
            lookup(DEFAULT_PROVIDER_VAR)
                .map(|p| p.trim().to_ascii_lowercase())
                .unwrap_or_else(|| "codex".to_string()),
        );
        for name in KNOWN_PROVIDERS {
            config = config.with_provider(ProviderConfig::from_lookup(name, &lookup)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that the default provider is configured
    pub fn validate(&self) -> Result<()> {
        if self.provider(&self.default_provider).is_none() {
            return Err(BridgeError::Config(format!(
                "{} names unknown provider '{}'",
                DEFAULT_PROVIDER_VAR, self.default_provider
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.default_provider, "codex");

        let codex = config.provider("codex").unwrap();
        assert_eq!(codex.model, "codex");
        assert_eq!(codex.transport.mode, TransportMode::Exec);
        assert_eq!(codex.transport.command, "codex exec --json --skip-git-repo-check -");
        assert_eq!(codex.transport.daemon_command, "codex daemon --stdio");
        assert_eq!(codex.transport.timeout_secs, 120);
        assert_eq!(codex.transport.prompt_input, PromptInput::Stdin);

        let gemini = config.provider("gemini").unwrap();
        assert_eq!(gemini.transport.command, "gemini -o stream-json");
        assert_eq!(
            gemini.transport.socket_path,
            Some(PathBuf::from("/tmp/gemini-daemon.sock"))
        );
    }

    #[test]
    fn test_daemon_mode_refinement() {
        let config = ProviderConfig::from_lookup(
            "codex",
            lookup(&[("CODEX_MODE", "daemon"), ("CODEX_DAEMON_MODE", "socket")]),
        )
        .unwrap();
        assert_eq!(config.transport.mode, TransportMode::DaemonSocket);

        let config =
            ProviderConfig::from_lookup("codex", lookup(&[("CODEX_MODE", "daemon")])).unwrap();
        assert_eq!(config.transport.mode, TransportMode::DaemonStdio);
    }

    #[test]
    fn test_bad_values_name_the_variable() {
        let err = ProviderConfig::from_lookup("gemini", lookup(&[("GEMINI_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("GEMINI_TIMEOUT"));

        let err = ProviderConfig::from_lookup("codex", lookup(&[("CODEX_MODE", "carrier-pigeon")]))
            .unwrap_err();
        assert!(err.to_string().contains("CODEX_MODE"));

        let err = BridgeConfig::from_lookup(lookup(&[(DEFAULT_PROVIDER_VAR, "claude")])).unwrap_err();
        assert!(err.to_string().contains(DEFAULT_PROVIDER_VAR));
    }

    #[test]
    fn test_with_provider_replaces_by_name() {
        let config = BridgeConfig::default()
            .with_provider(ProviderConfig::codex().with_model("gpt-5-codex"));
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.provider("codex").unwrap().model, "gpt-5-codex");
    }
}
