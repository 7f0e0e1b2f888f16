//! Configuration for the round monitor.
//!
//! Settings are read from a TOML file (by default `round-monitor.toml` in the
//! working directory), then layered with environment variables and CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! enabled = true
//! restart_time_buffer = 180
//! show_forging_order = true
//! show_next_forgers = 3
//! show_round_time = true
//! ansi = true
//! status_level = "info"
//! delegate = ["genesis_1", "genesis_2"]
//! secrets_file = "/home/ark/.config/ark-core/mainnet/delegates.json"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 5001
//!
//! [node]
//! api_url = "http://127.0.0.1:4003"
//! poll_interval_ms = 1000
//!
//! [restart]
//! token = "ark"
//! # command = "systemctl restart ark-core"
//!
//! [log]
//! level = "info"
//! json = false
//! # file = "/var/log/round-monitor/monitor.log"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;
use crate::reporter::ReportOptions;
use crate::restart::RestartPlan;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "round-monitor.toml";

const DEFAULT_P2P_PORT: u16 = 4001;
const CONTROL_PORT_OFFSET: u16 = 1000;

/// Level at which the per-slot status line is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl std::fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLevel::Error => write!(f, "error"),
            StatusLevel::Warn => write!(f, "warn"),
            StatusLevel::Info => write!(f, "info"),
            StatusLevel::Debug => write!(f, "debug"),
        }
    }
}

impl std::str::FromStr for StatusLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(StatusLevel::Error),
            "warn" => Ok(StatusLevel::Warn),
            "info" => Ok(StatusLevel::Info),
            "debug" => Ok(StatusLevel::Debug),
            _ => anyhow::bail!(
                "Invalid status level '{}'. Valid values: error, warn, info, debug",
                s
            ),
        }
    }
}

/// Monitored participant names: a single name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateList {
    One(String),
    Many(Vec<String>),
}

impl DelegateList {
    pub fn names(&self) -> Vec<String> {
        match self {
            DelegateList::One(name) => vec![name.clone()],
            DelegateList::Many(names) => names.clone(),
        }
    }
}

/// Control server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to the node's P2P port plus 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
        }
    }
}

/// Node API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// How often the last block is polled for new-block notifications.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            api_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// What gets restarted once a safe window is found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestartSection {
    /// Process name prefix (`<token>-forger`, `<token>-relay`, `<token>-core`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Shell command run instead of restarting the node processes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Diagnostic logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write logs to a daily-rolling file at this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

/// The complete configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorToml {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds of clearance required before a restart may proceed.
    #[serde(default = "default_restart_time_buffer")]
    pub restart_time_buffer: u64,
    #[serde(default = "default_true")]
    pub show_forging_order: bool,
    /// Number of upcoming forgers shown in the status line (0 disables).
    #[serde(default = "default_show_next_forgers")]
    pub show_next_forgers: usize,
    #[serde(default = "default_true")]
    pub show_round_time: bool,
    #[serde(default = "default_true")]
    pub ansi: bool,
    #[serde(default = "default_log_level")]
    pub status_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<DelegateList>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    /// JSON file of the form `{ "secrets": [...] }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub restart: RestartSection,
    #[serde(default)]
    pub log: LogSection,
}

fn default_true() -> bool {
    true
}

fn default_restart_time_buffer() -> u64 {
    180
}

fn default_show_next_forgers() -> usize {
    3
}

impl Default for MonitorToml {
    fn default() -> Self {
        Self {
            enabled: true,
            restart_time_buffer: default_restart_time_buffer(),
            show_forging_order: true,
            show_next_forgers: default_show_next_forgers(),
            show_round_time: true,
            ansi: true,
            status_level: default_log_level(),
            delegate: None,
            secrets: Vec::new(),
            secrets_file: None,
            server: ServerSection::default(),
            node: NodeSection::default(),
            restart: RestartSection::default(),
            log: LogSection::default(),
        }
    }
}

#[derive(Deserialize)]
struct SecretsFile {
    #[serde(default)]
    secrets: Vec<String>,
}

impl MonitorToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse round monitor config")
    }

    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.status_level.parse::<StatusLevel>().is_err() {
            warnings.push(format!(
                "Invalid status_level '{}': falling back to 'info'",
                self.status_level
            ));
        }

        if self.restart_time_buffer == 0 {
            warnings.push(
                "restart_time_buffer is 0: a restart may land right before a forging slot"
                    .to_string(),
            );
        }

        if !matches!(self.server.host.as_str(), "127.0.0.1" | "localhost" | "::1") {
            warnings.push(format!(
                "server.host '{}' is not a loopback address: the restart endpoint will be reachable remotely",
                self.server.host
            ));
        }

        if let Some(command) = &self.restart.command
            && command.trim().is_empty()
        {
            warnings.push("restart.command is empty".to_string());
        }

        if self.delegate.is_none() && self.secrets.is_empty() && self.secrets_file.is_none() {
            warnings.push(
                "No delegate or secrets configured: restarts will not wait for a forging slot"
                    .to_string(),
            );
        }

        warnings
    }
}

/// Configuration merged from file, environment and CLI.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub toml: MonitorToml,
    /// CLI override for the control server port.
    pub cli_port: Option<u16>,
    /// CLI override for the node API URL.
    pub cli_api_url: Option<String>,
}

impl MonitorConfig {
    pub fn new(toml: MonitorToml) -> Self {
        Self {
            toml,
            cli_port: None,
            cli_api_url: None,
        }
    }

    /// Load from `path` (or defaults) with CLI overrides.
    pub fn with_cli_args(
        path: &Path,
        port: Option<u16>,
        api_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(MonitorToml::load_or_default(path)?);
        config.cli_port = port;
        config.cli_api_url = api_url;
        Ok(config)
    }

    pub fn enabled(&self) -> bool {
        self.toml.enabled
    }

    pub fn server_host(&self) -> &str {
        &self.toml.server.host
    }

    /// Control server port (CLI → file → `CORE_P2P_PORT` + 1000).
    pub fn server_port(&self) -> u16 {
        self.cli_port.or(self.toml.server.port).unwrap_or_else(|| {
            std::env::var("CORE_P2P_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(DEFAULT_P2P_PORT)
                .saturating_add(CONTROL_PORT_OFFSET)
        })
    }

    /// Node API base URL (CLI → file → `ROUND_MONITOR_API_URL` → default).
    pub fn api_url(&self) -> String {
        self.cli_api_url
            .clone()
            .or_else(|| self.toml.node.api_url.clone())
            .or_else(|| std::env::var("ROUND_MONITOR_API_URL").ok())
            .unwrap_or_else(|| "http://127.0.0.1:4003".to_string())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.toml.node.poll_interval_ms.max(100))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.toml.node.request_timeout_ms)
    }

    /// Process name prefix (file → `CORE_TOKEN` → "ark").
    pub fn process_token(&self) -> String {
        self.toml
            .restart
            .token
            .clone()
            .or_else(|| std::env::var("CORE_TOKEN").ok())
            .unwrap_or_else(|| "ark".to_string())
    }

    pub fn restart_plan(&self) -> RestartPlan {
        match &self.toml.restart.command {
            Some(command) if !command.trim().is_empty() => RestartPlan::Command(command.clone()),
            _ => RestartPlan::for_token(&self.process_token()),
        }
    }

    pub fn restart_time_buffer(&self) -> Duration {
        Duration::from_secs(self.toml.restart_time_buffer)
    }

    /// Status line level; invalid values fall back to `info`.
    pub fn status_level(&self) -> StatusLevel {
        self.toml.status_level.parse().unwrap_or_default()
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            show_next_forgers: self.toml.show_next_forgers,
            show_round_time: self.toml.show_round_time,
            ansi: self.toml.ansi,
        }
    }

    pub fn delegate_names(&self) -> Vec<String> {
        self.toml
            .delegate
            .as_ref()
            .map(DelegateList::names)
            .unwrap_or_default()
    }

    /// Inline secrets followed by those from `secrets_file`.
    pub fn secrets(&self) -> Result<Vec<String>, ConfigError> {
        let mut secrets = self.toml.secrets.clone();
        if let Some(path) = &self.toml.secrets_file {
            secrets.extend(load_secrets_file(path)?);
        }
        Ok(secrets)
    }
}

fn load_secrets_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Secrets {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let file: SecretsFile = serde_json::from_str(&content).map_err(|e| ConfigError::Secrets {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(file.secrets)
}
