use anyhow::Result;
use async_trait::async_trait;

/// Control over the node's operating-system processes.
///
/// Real implementation: `Pm2` in the root crate. Tests substitute a recorder.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Whether a process with this name is currently running.
    async fn is_running(&self, name: &str) -> Result<bool>;

    /// Restart the named process.
    async fn restart(&self, name: &str) -> Result<()>;

    /// Run an arbitrary shell command to completion.
    async fn run_command(&self, command: &str) -> Result<()>;
}
