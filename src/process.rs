//! pm2-backed process control.

use std::process::{Output, Stdio};

use anyhow::Result;
use async_trait::async_trait;
use monitor_common::ProcessControl;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ProcessError;

#[derive(Debug, Deserialize)]
struct Pm2Env {
    #[serde(default)]
    status: Option<String>,
}

/// One entry of `pm2 jlist`.
#[derive(Debug, Deserialize)]
pub struct Pm2Process {
    pub name: String,
    #[serde(default)]
    pm2_env: Option<Pm2Env>,
}

impl Pm2Process {
    pub fn is_online(&self) -> bool {
        self.pm2_env
            .as_ref()
            .and_then(|env| env.status.as_deref())
            == Some("online")
    }
}

/// Parse `pm2 jlist` output. pm2 may print notices before the JSON, so only
/// the last non-empty line is read.
pub fn parse_process_list(stdout: &str) -> Result<Vec<Pm2Process>, ProcessError> {
    let last = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("[]");
    serde_json::from_str(last).map_err(ProcessError::ProcessList)
}

/// Runs pm2 and shell commands on the local host.
#[derive(Debug, Clone)]
pub struct Pm2 {
    binary: String,
}

impl Default for Pm2 {
    fn default() -> Self {
        Self {
            binary: "pm2".to_string(),
        }
    }
}

impl Pm2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different pm2 executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<Output, ProcessError> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %command, "Running process command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProcessError::NonZeroExit {
                command,
                code: output.status.code().unwrap_or(-1),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl ProcessControl for Pm2 {
    async fn is_running(&self, name: &str) -> Result<bool> {
        let output = self.run(&self.binary, &["jlist"]).await?;
        let processes = parse_process_list(&String::from_utf8_lossy(&output.stdout))?;
        Ok(processes.iter().any(|p| p.name == name && p.is_online()))
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.run(&self.binary, &["restart", name, "--update-env"])
            .await?;
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<()> {
        self.run("sh", &["-c", command]).await?;
        Ok(())
    }
}
