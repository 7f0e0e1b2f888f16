use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::milestones::Milestones;

/// A block as seen by the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    pub height: u64,
    /// Seconds since the network epoch.
    pub timestamp: u64,
    pub generator_public_key: String,
}

/// Read access to the chain.
#[async_trait]
pub trait ChainState: Send + Sync {
    /// The last block applied by the node.
    async fn last_block(&self) -> Result<BlockData>;

    /// The block at `height`, if the node has it.
    async fn block_at(&self, height: u64) -> Result<Option<BlockData>>;

    /// The network's milestone table.
    async fn milestones(&self) -> Result<Milestones>;
}

/// Notification of applied blocks.
///
/// Each subscriber receives every block applied after it subscribed. A
/// lagging subscriber may miss blocks and should re-read the chain state.
pub trait BlockEvents: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<BlockData>;
}
