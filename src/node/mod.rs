//! Node HTTP API backend.
//!
//! Implements the chain, directory and block-notification collaborators on
//! top of the node's public REST API.

mod client;
mod identity;
mod poller;
mod shuffle;

pub use client::NodeClient;
pub use identity::public_key_from_secret;
pub use poller::BlockPoller;
pub use shuffle::shuffle_for_round;
