//! Height-indexed network parameters and the round arithmetic built on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MilestoneError;

/// Network parameters that take effect at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub height: u64,
    /// Seconds per slot.
    pub block_time: u32,
    /// Participants per round.
    pub active_participants: u32,
    /// Genesis epoch of the network; block timestamps count seconds from here.
    pub epoch: DateTime<Utc>,
}

/// Position of a height within the round sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundInfo {
    pub round: u64,
    /// Height of the first block of the round.
    pub round_height: u64,
    pub next_round: u64,
    pub max_participants: u32,
}

/// Milestones sorted by activation height, starting at height 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestones(Vec<Milestone>);

impl Milestones {
    pub fn new(mut milestones: Vec<Milestone>) -> Result<Self, MilestoneError> {
        milestones.sort_by_key(|m| m.height);

        let first = milestones.first().ok_or(MilestoneError::Empty)?;
        if first.height > 1 {
            return Err(MilestoneError::MissingGenesis {
                height: first.height,
            });
        }

        for milestone in &milestones {
            if milestone.block_time == 0 {
                return Err(MilestoneError::ZeroBlockTime {
                    height: milestone.height,
                });
            }
            if milestone.active_participants == 0 {
                return Err(MilestoneError::NoParticipants {
                    height: milestone.height,
                });
            }
        }

        Ok(Self(milestones))
    }

    /// A table with a single milestone at height 1.
    pub fn single(block_time: u32, active_participants: u32, epoch: DateTime<Utc>) -> Self {
        Self(vec![Milestone {
            height: 1,
            block_time: block_time.max(1),
            active_participants: active_participants.max(1),
            epoch,
        }])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Milestone> {
        self.0.iter()
    }

    /// The milestone in force at `height`.
    pub fn at(&self, height: u64) -> &Milestone {
        self.0
            .iter()
            .rev()
            .find(|m| m.height <= height)
            .unwrap_or(&self.0[0])
    }

    /// Milestones after genesis that change the block time, by height.
    pub fn block_time_changes(&self) -> impl Iterator<Item = &Milestone> {
        let mut block_time = self.at(1).block_time;
        self.0.iter().filter(move |m| {
            if m.height <= 1 || m.block_time == block_time {
                return false;
            }
            block_time = m.block_time;
            true
        })
    }

    /// Round containing `height`.
    ///
    /// Participant-count changes are expected to land on round boundaries;
    /// each change starts a new span whose rounds are counted from its
    /// activation height.
    pub fn round_at(&self, height: u64) -> RoundInfo {
        let height = height.max(1);
        let mut span_start = 1u64;
        let mut active = u64::from(self.at(1).active_participants);
        let mut round = 1u64;

        for milestone in self.0.iter().filter(|m| m.height > 1 && m.height <= height) {
            let next = u64::from(milestone.active_participants);
            if next == active {
                continue;
            }
            round += (milestone.height - span_start) / active;
            span_start = milestone.height;
            active = next;
        }

        let offset = (height - span_start) / active;
        let round = round + offset;

        RoundInfo {
            round,
            round_height: span_start + offset * active,
            next_round: round + 1,
            max_participants: active as u32,
        }
    }

    /// Whether `height` is the first block of a round.
    pub fn is_new_round(&self, height: u64) -> bool {
        self.round_at(height).round_height == height.max(1)
    }
}
