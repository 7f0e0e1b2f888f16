use std::sync::Arc;
use std::time::Duration;

use monitor_common::{BlockData, BlockEvents, ChainState};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Publishes applied blocks by polling the chain for a new tip.
///
/// A block is sent whenever the last height grows. If the tip moves
/// backwards the new tip becomes the baseline without being sent.
pub struct BlockPoller {
    tx: broadcast::Sender<BlockData>,
    handle: JoinHandle<()>,
}

impl BlockPoller {
    pub fn spawn(chain: Arc<dyn ChainState>, interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let sender = tx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_height: Option<u64> = None;

            loop {
                ticker.tick().await;
                let block = match chain.last_block().await {
                    Ok(block) => block,
                    Err(e) => {
                        debug!(error = %e, "Block poll failed");
                        continue;
                    }
                };

                if last_height == Some(block.height) {
                    continue;
                }
                let advanced = last_height.is_none_or(|h| block.height > h);
                last_height = Some(block.height);
                if advanced {
                    // No subscribers is not an error.
                    let _ = sender.send(block);
                }
            }
        });

        Self { tx, handle }
    }
}

impl BlockEvents for BlockPoller {
    fn subscribe(&self) -> broadcast::Receiver<BlockData> {
        self.tx.subscribe()
    }
}

impl Drop for BlockPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use monitor_common::Milestones;
    use std::sync::Mutex;

    struct SteppingChain {
        heights: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ChainState for SteppingChain {
        async fn last_block(&self) -> Result<BlockData> {
            let mut heights = self.heights.lock().unwrap();
            let height = if heights.len() > 1 {
                heights.remove(0)
            } else {
                heights[0]
            };
            Ok(BlockData {
                height,
                timestamp: height * 8,
                generator_public_key: String::new(),
            })
        }

        async fn block_at(&self, _height: u64) -> Result<Option<BlockData>> {
            Ok(None)
        }

        async fn milestones(&self) -> Result<Milestones> {
            Ok(Milestones::single(8, 51, Utc::now()))
        }
    }

    #[tokio::test]
    async fn test_poller_sends_advancing_heights() {
        let chain = Arc::new(SteppingChain {
            heights: Mutex::new(vec![10, 10, 11, 9, 12]),
        });
        let poller = BlockPoller::spawn(chain, Duration::from_millis(5));
        let mut rx = poller.subscribe();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            let block = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("poller stalled")
                .unwrap();
            seen.push(block.height);
        }
        assert_eq!(seen, vec![10, 11, 12]);
    }
}
