//! Shared domain types and collaborator interfaces for the round monitor.
//!
//! The monitor core never talks to a node, a process manager or a clock
//! directly. It is handed trait objects for each of them:
//!
//! | Trait            | Provides                                              |
//! |------------------|-------------------------------------------------------|
//! | [`ChainState`]   | last applied block, blocks by height, milestones      |
//! | [`BlockEvents`]  | a broadcast stream of applied blocks                  |
//! | [`Directory`]    | participant lookups and secret resolution             |
//! | [`ProcessControl`] | querying and restarting node processes              |
//! | [`Clock`]        | wall-clock time                                       |

pub mod chain;
pub mod clock;
pub mod directory;
pub mod error;
pub mod milestones;
pub mod process;

pub use chain::{BlockData, BlockEvents, ChainState};
pub use clock::{Clock, SystemClock};
pub use directory::{Directory, Participant, ProducedBlock};
pub use error::MilestoneError;
pub use milestones::{Milestone, Milestones, RoundInfo};
pub use process::ProcessControl;
