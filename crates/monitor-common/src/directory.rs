use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::milestones::RoundInfo;

/// The most recent block a participant produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedBlock {
    pub height: u64,
    /// Seconds since the network epoch.
    pub timestamp: u64,
}

/// A registered block producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub last_block: Option<ProducedBlock>,
}

/// Lookups against the set of registered participants.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Derive the public identity belonging to a forging secret.
    fn resolve_identity(&self, secret: &str) -> Result<String>;

    /// Look a participant up by its registered name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Participant>>;

    /// Look a participant up by its public identity.
    async fn find_by_identity(&self, public_key: &str) -> Result<Option<Participant>>;

    /// Participants of `round`, in the round's canonical forging order.
    async fn active_participants(&self, round: &RoundInfo) -> Result<Vec<Participant>>;
}
