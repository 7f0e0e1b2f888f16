//! Slot-driven evaluation loop.
//!
//! Evaluates once, then sleeps until the next slot boundary while feeding
//! block notifications to the monitor. The timer is not reset by blocks.

use std::future::Future;

use monitor_common::BlockData;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::monitor::{CycleOutcome, Monitor};

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// A restart was committed and executed.
    Restarted,
    /// The shutdown signal fired.
    Shutdown,
}

pub struct SlotScheduler {
    monitor: Monitor,
    blocks: broadcast::Receiver<BlockData>,
}

impl SlotScheduler {
    pub fn new(monitor: Monitor, blocks: broadcast::Receiver<BlockData>) -> Self {
        Self { monitor, blocks }
    }

    pub async fn run<F>(mut self, shutdown: F) -> SchedulerExit
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut events_open = true;

        loop {
            match self.monitor.evaluate().await {
                Ok(CycleOutcome::RestartCommitted) => {
                    self.monitor.execute_restart().await;
                    return SchedulerExit::Restarted;
                }
                Ok(outcome) => debug!(?outcome, "Evaluation cycle finished"),
                Err(e) => warn!(error = %e, "Evaluation cycle failed"),
            }

            let sleep = tokio::time::sleep(self.monitor.time_until_next_slot());
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    _ = &mut shutdown => return SchedulerExit::Shutdown,
                    _ = &mut sleep => break,
                    event = self.blocks.recv(), if events_open => match event {
                        Ok(block) => self.apply_block(&block).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Missed block notifications, re-reading chain");
                            if let Err(e) = self.monitor.resync().await {
                                warn!(error = %e, "Resync after missed blocks failed");
                            }
                        }
                        Err(RecvError::Closed) => {
                            warn!("Block notifications closed, continuing on slot timer only");
                            events_open = false;
                        }
                    },
                }
            }
        }
    }

    async fn apply_block(&mut self, block: &BlockData) {
        match self.monitor.on_block_applied(block).await {
            Ok(true) => debug!(height = block.height, "Started new round"),
            Ok(false) => {}
            Err(e) => warn!(height = block.height, error = %e, "Failed to apply block"),
        }
    }
}
