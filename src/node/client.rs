//! Read-only client for the node's public HTTP API.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use monitor_common::{
    BlockData, ChainState, Directory, Milestone, Milestones, Participant, ProducedBlock, RoundInfo,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use super::identity::public_key_from_secret;
use super::shuffle::shuffle_for_round;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ApiTimestamp {
    epoch: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerator {
    public_key: String,
}

#[derive(Deserialize)]
struct ApiBlock {
    height: u64,
    timestamp: ApiTimestamp,
    generator: ApiGenerator,
}

impl From<ApiBlock> for BlockData {
    fn from(block: ApiBlock) -> Self {
        Self {
            height: block.height,
            timestamp: block.timestamp.epoch,
            generator_public_key: block.generator.public_key,
        }
    }
}

#[derive(Deserialize)]
struct ApiLastBlock {
    height: u64,
    timestamp: ApiTimestamp,
}

#[derive(Deserialize, Default)]
struct ApiDelegateBlocks {
    #[serde(default)]
    last: Option<ApiLastBlock>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDelegate {
    username: String,
    public_key: String,
    #[serde(default)]
    blocks: Option<ApiDelegateBlocks>,
}

impl From<ApiDelegate> for Participant {
    fn from(delegate: ApiDelegate) -> Self {
        let last_block = delegate
            .blocks
            .and_then(|b| b.last)
            .map(|last| ProducedBlock {
                height: last.height,
                timestamp: last.timestamp.epoch,
            });
        Self {
            name: delegate.username,
            public_key: delegate.public_key,
            last_block,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRoundDelegate {
    public_key: String,
    votes: serde_json::Value,
}

#[derive(Deserialize)]
struct ApiCryptoConfig {
    milestones: Vec<ApiMilestone>,
}

/// A milestone as published by the node; only changed fields are present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiMilestone {
    pub height: u64,
    #[serde(default)]
    pub blocktime: Option<u32>,
    #[serde(default)]
    pub active_delegates: Option<u32>,
    #[serde(default)]
    pub epoch: Option<DateTime<Utc>>,
}

/// Carry each milestone's unset fields forward from the one before it.
pub(crate) fn merge_milestones(mut raw: Vec<ApiMilestone>) -> Result<Milestones> {
    raw.sort_by_key(|m| m.height);

    let mut merged: Vec<Milestone> = Vec::with_capacity(raw.len());
    for milestone in raw {
        let previous = merged.last();
        let block_time = milestone.blocktime.or(previous.map(|p| p.block_time));
        let active = milestone
            .active_delegates
            .or(previous.map(|p| p.active_participants));
        let epoch = milestone.epoch.or(previous.map(|p| p.epoch));

        let (Some(block_time), Some(active_participants), Some(epoch)) = (block_time, active, epoch)
        else {
            bail!(
                "Milestone at height {} is missing blocktime, activeDelegates or epoch",
                milestone.height
            );
        };
        merged.push(Milestone {
            height: milestone.height,
            block_time,
            active_participants,
            epoch,
        });
    }

    Ok(Milestones::new(merged)?)
}

fn vote_weight(votes: &serde_json::Value) -> u128 {
    match votes {
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        serde_json::Value::Number(n) => n.as_u64().map(u128::from).unwrap_or(0),
        _ => 0,
    }
}

/// Order round participants by weight, heaviest first, ties by key.
fn rank_by_votes(mut delegates: Vec<ApiRoundDelegate>) -> Vec<String> {
    delegates.sort_by(|a, b| {
        vote_weight(&b.votes)
            .cmp(&vote_weight(&a.votes))
            .then_with(|| a.public_key.cmp(&b.public_key))
    });
    delegates.into_iter().map(|d| d.public_key).collect()
}

/// [`ChainState`] and [`Directory`] backed by the node API.
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
    milestones: OnceCell<Milestones>,
}

impl NodeClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build node API client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            milestones: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path`, unwrapping the `data` envelope. A 404 is `None`.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach node API at {}", url))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope = resp
            .error_for_status()
            .with_context(|| format!("Node API returned error status for {}", path))?
            .json::<Envelope<T>>()
            .await
            .with_context(|| format!("Failed to parse node API response from {}", path))?;
        Ok(Some(envelope.data))
    }

    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path)
            .await?
            .with_context(|| format!("Node API has nothing at {}", path))
    }

    async fn fetch_milestones(&self) -> Result<Milestones> {
        let config: ApiCryptoConfig = self.get_required("/api/node/configuration/crypto").await?;
        merge_milestones(config.milestones)
    }
}

#[async_trait]
impl ChainState for NodeClient {
    async fn last_block(&self) -> Result<BlockData> {
        let block: ApiBlock = self.get_required("/api/blocks/last").await?;
        Ok(block.into())
    }

    async fn block_at(&self, height: u64) -> Result<Option<BlockData>> {
        let block: Option<ApiBlock> = self.get(&format!("/api/blocks/{}", height)).await?;
        Ok(block.map(Into::into))
    }

    async fn milestones(&self) -> Result<Milestones> {
        self.milestones
            .get_or_try_init(|| self.fetch_milestones())
            .await
            .cloned()
    }
}

#[async_trait]
impl Directory for NodeClient {
    fn resolve_identity(&self, secret: &str) -> Result<String> {
        public_key_from_secret(secret)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Participant>> {
        let delegate: Option<ApiDelegate> = self.get(&format!("/api/delegates/{}", name)).await?;
        Ok(delegate.map(Into::into))
    }

    async fn find_by_identity(&self, public_key: &str) -> Result<Option<Participant>> {
        let delegate: Option<ApiDelegate> =
            self.get(&format!("/api/delegates/{}", public_key)).await?;
        Ok(delegate.map(Into::into))
    }

    async fn active_participants(&self, round: &RoundInfo) -> Result<Vec<Participant>> {
        let delegates: Vec<ApiRoundDelegate> = self
            .get_required(&format!("/api/rounds/{}/delegates", round.round))
            .await?;

        let mut keys = rank_by_votes(delegates);
        shuffle_for_round(round.round, &mut keys);
        debug!(round = round.round, participants = keys.len(), "Fetched round participants");

        let mut participants = Vec::with_capacity(keys.len());
        for public_key in keys {
            let participant = match self.find_by_identity(&public_key).await? {
                Some(found) => found,
                None => Participant {
                    name: public_key.clone(),
                    public_key,
                    last_block: None,
                },
            };
            participants.push(participant);
        }
        Ok(participants)
    }
}
