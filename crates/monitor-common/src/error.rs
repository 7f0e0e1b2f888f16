use thiserror::Error;

/// Errors raised while building a milestone table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MilestoneError {
    #[error("No milestones configured")]
    Empty,

    #[error("First milestone starts at height {height}, expected height 1")]
    MissingGenesis { height: u64 },

    #[error("Milestone at height {height} has a block time of zero")]
    ZeroBlockTime { height: u64 },

    #[error("Milestone at height {height} has no active participants")]
    NoParticipants { height: u64 },
}
