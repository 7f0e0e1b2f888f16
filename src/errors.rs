//! Typed error hierarchy for the round monitor.
//!
//! - `RestartError`: rejected restart control calls
//! - `MonitorError`: evaluation-cycle failures
//! - `ProcessError`: process-control backend failures
//! - `ConfigError`: configuration loading failures

use std::path::PathBuf;

use thiserror::Error;

/// Rejections from the restart control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RestartError {
    #[error("Safe restart already requested")]
    AlreadyRequested,

    #[error("No safe restart was requested")]
    NothingPending,

    #[error("Safe restart is already in progress")]
    AlreadyCommitted,
}

/// Errors from a single evaluation cycle.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Round {round} has no active participants")]
    EmptyRound { round: u64 },

    #[error("Monitor has not computed a round yet")]
    RoundNotComputed,

    #[error("Chain state lookup failed: {0}")]
    Chain(#[source] anyhow::Error),

    #[error("Participant directory lookup failed: {0}")]
    Directory(#[source] anyhow::Error),

    #[error("Block {height} is needed for slot timing but was not found")]
    MissingBlock { height: u64 },
}

/// Errors from the process-control backend.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code}")]
    NonZeroExit { command: String, code: i32 },

    #[error("Failed to parse pm2 process list: {0}")]
    ProcessList(#[source] serde_json::Error),
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to read secrets file at {path}: {message}")]
    Secrets { path: PathBuf, message: String },
}
