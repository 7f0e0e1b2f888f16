//! Per-participant forge tracking.
//!
//! The tracker holds the participants this node cares about. Each round it
//! resolves missing names or identities through the [`Directory`], then on
//! every cycle locates them in the live order and classifies whether they
//! forged in their slot.

use std::time::Duration;

use monitor_common::Directory;
use serde::Serialize;
use tracing::debug;

use crate::errors::MonitorError;
use crate::slots::SlotClock;

/// Outcome of a participant's slot in the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeState {
    #[default]
    Unknown,
    Success,
    Failure,
}

/// A participant this node is watching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoredParticipant {
    pub name: Option<String>,
    pub public_key: Option<String>,
    /// Index in the live order, if the participant appeared this cycle.
    pub position: Option<usize>,
    pub time_to_forge: Option<Duration>,
    pub state: ForgeState,
}

impl MonitoredParticipant {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn by_identity(public_key: impl Into<String>) -> Self {
        Self {
            public_key: Some(public_key.into()),
            ..Default::default()
        }
    }

    /// Both name and identity are known.
    pub fn is_resolved(&self) -> bool {
        self.name.is_some() && self.public_key.is_some()
    }

    fn reset_round(&mut self) {
        self.position = None;
        self.time_to_forge = None;
        self.state = ForgeState::Unknown;
    }
}

/// A monitored participant's place in the live order for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForgingEntry {
    pub name: String,
    pub position: usize,
    #[serde(rename = "time_to_forge_secs", serialize_with = "as_secs")]
    pub time_to_forge: Duration,
    pub state: ForgeState,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Slot context for one classification pass.
#[derive(Debug, Clone, Copy)]
pub struct SlotContext<'a> {
    pub clock: &'a SlotClock,
    pub live_slot: u64,
    pub anchor_slot: u64,
}

/// Classify a participant's slot for the round anchored at `anchor_slot`.
///
/// Resolved states never change within a round. A participant that never
/// forged stays unknown.
pub fn classify(
    current: ForgeState,
    last_block_slot: Option<u64>,
    live_slot: u64,
    anchor_slot: u64,
    fixed_position: Option<usize>,
) -> ForgeState {
    if current != ForgeState::Unknown {
        return current;
    }
    let Some(last_block_slot) = last_block_slot else {
        return ForgeState::Unknown;
    };

    if last_block_slot >= anchor_slot {
        ForgeState::Success
    } else if let Some(position) = fixed_position
        && live_slot > anchor_slot + position as u64
    {
        ForgeState::Failure
    } else {
        ForgeState::Unknown
    }
}

#[derive(Debug, Default)]
pub struct ForgeStatusTracker {
    participants: Vec<MonitoredParticipant>,
}

impl ForgeStatusTracker {
    pub fn new(participants: Vec<MonitoredParticipant>) -> Self {
        Self { participants }
    }

    /// Build from forging secrets and participant names.
    ///
    /// Secrets are resolved to identities immediately and never retained.
    /// A secret that cannot be resolved is skipped.
    pub fn from_sources(secrets: &[String], names: &[String], directory: &dyn Directory) -> Self {
        let mut participants = Vec::with_capacity(secrets.len() + names.len());

        for secret in secrets {
            match directory.resolve_identity(secret) {
                Ok(public_key) => participants.push(MonitoredParticipant::by_identity(public_key)),
                Err(e) => debug!(error = %e, "Skipping unresolvable forging secret"),
            }
        }
        participants.extend(names.iter().map(MonitoredParticipant::by_name));

        Self::new(participants)
    }

    pub fn participants(&self) -> &[MonitoredParticipant] {
        &self.participants
    }

    pub fn resolved_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_resolved()).count()
    }

    /// Reset per-round state and resolve missing names or identities.
    ///
    /// Lookup failures leave the participant unresolved until the next round.
    /// Exact duplicates are removed once resolution is done.
    pub async fn prepare_round(&mut self, directory: &dyn Directory) {
        for participant in &mut self.participants {
            participant.reset_round();

            if participant.name.is_none()
                && let Some(public_key) = participant.public_key.as_deref()
            {
                match directory.find_by_identity(public_key).await {
                    Ok(Some(found)) => participant.name = Some(found.name),
                    Ok(None) => debug!(public_key, "No participant registered for identity"),
                    Err(e) => debug!(public_key, error = %e, "Identity lookup failed"),
                }
            }

            if participant.public_key.is_none()
                && let Some(name) = participant.name.as_deref()
            {
                match directory.find_by_name(name).await {
                    Ok(Some(found)) => participant.public_key = Some(found.public_key),
                    Ok(None) => debug!(name, "No participant registered under name"),
                    Err(e) => debug!(name, error = %e, "Name lookup failed"),
                }
            }
        }

        self.dedup();
    }

    fn dedup(&mut self) {
        let mut kept: Vec<MonitoredParticipant> = Vec::with_capacity(self.participants.len());
        for participant in self.participants.drain(..) {
            let duplicate = kept
                .iter()
                .any(|k| k.name == participant.name && k.public_key == participant.public_key);
            if !duplicate {
                kept.push(participant);
            }
        }
        self.participants = kept;
    }

    /// Locate monitored participants in `live_order` and classify their slots.
    ///
    /// Returns one entry per monitored participant found, in live-order
    /// sequence.
    pub async fn update(
        &mut self,
        live_order: &[String],
        fixed_order: &[String],
        slots: SlotContext<'_>,
        directory: &dyn Directory,
    ) -> Result<Vec<ForgingEntry>, MonitorError> {
        let block_time = slots.clock.block_time();
        let mut entries = Vec::new();

        for (index, name) in live_order.iter().enumerate() {
            let Some(participant) = self
                .participants
                .iter_mut()
                .rev()
                .find(|p| p.name.as_deref() == Some(name.as_str()))
            else {
                continue;
            };

            let found = directory
                .find_by_name(name)
                .await
                .map_err(MonitorError::Directory)?;

            if let Some(last_block) = found.and_then(|p| p.last_block) {
                participant.state = classify(
                    participant.state,
                    Some(slots.clock.slot_at(last_block.timestamp)),
                    slots.live_slot,
                    slots.anchor_slot,
                    fixed_order.iter().position(|n| n == name),
                );
            }

            let time_to_forge = block_time * index as u32;
            participant.position = Some(index);
            participant.time_to_forge = Some(time_to_forge);

            entries.push(ForgingEntry {
                name: name.clone(),
                position: index,
                time_to_forge,
                state: participant.state,
            });
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use monitor_common::{Participant, ProducedBlock, RoundInfo};

    struct StaticDirectory {
        participants: Vec<Participant>,
    }

    impl StaticDirectory {
        fn new(entries: &[(&str, &str, Option<u64>)]) -> Self {
            Self {
                participants: entries
                    .iter()
                    .map(|(name, key, last)| Participant {
                        name: name.to_string(),
                        public_key: key.to_string(),
                        last_block: last.map(|ts| ProducedBlock {
                            height: ts,
                            timestamp: ts,
                        }),
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Directory for StaticDirectory {
        fn resolve_identity(&self, secret: &str) -> Result<String> {
            match secret.strip_prefix("secret-") {
                Some(name) => Ok(format!("pk-{}", name)),
                None => bail!("not a secret"),
            }
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Participant>> {
            Ok(self.participants.iter().find(|p| p.name == name).cloned())
        }

        async fn find_by_identity(&self, public_key: &str) -> Result<Option<Participant>> {
            Ok(self
                .participants
                .iter()
                .find(|p| p.public_key == public_key)
                .cloned())
        }

        async fn active_participants(&self, _round: &RoundInfo) -> Result<Vec<Participant>> {
            Ok(self.participants.clone())
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn clock() -> SlotClock {
        let epoch: DateTime<Utc> = "2017-03-21T13:00:00Z".parse().unwrap();
        SlotClock::new(epoch, 8)
    }

    #[test]
    fn test_classify_success_when_forged_this_round() {
        assert_eq!(
            classify(ForgeState::Unknown, Some(20), 22, 20, Some(3)),
            ForgeState::Success
        );
    }

    #[test]
    fn test_classify_failure_when_window_passed() {
        assert_eq!(
            classify(ForgeState::Unknown, Some(10), 24, 20, Some(3)),
            ForgeState::Failure
        );
    }

    #[test]
    fn test_classify_unknown_before_window() {
        assert_eq!(
            classify(ForgeState::Unknown, Some(10), 23, 20, Some(3)),
            ForgeState::Unknown
        );
    }

    #[test]
    fn test_classify_never_forged_is_unknown() {
        assert_eq!(
            classify(ForgeState::Unknown, None, 99, 20, Some(0)),
            ForgeState::Unknown
        );
    }

    #[test]
    fn test_classify_resolved_states_are_sticky() {
        assert_eq!(
            classify(ForgeState::Success, Some(1), 99, 20, Some(0)),
            ForgeState::Success
        );
        assert_eq!(
            classify(ForgeState::Failure, Some(40), 41, 20, Some(0)),
            ForgeState::Failure
        );
    }

    #[test]
    fn test_from_sources_resolves_secrets_first() {
        let directory = StaticDirectory::new(&[]);
        let tracker = ForgeStatusTracker::from_sources(
            &names(&["secret-alice", "garbage"]),
            &names(&["bob"]),
            &directory,
        );

        assert_eq!(
            tracker.participants(),
            &[
                MonitoredParticipant::by_identity("pk-alice"),
                MonitoredParticipant::by_name("bob"),
            ]
        );
        assert_eq!(tracker.resolved_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_round_resolves_and_dedups() {
        let directory =
            StaticDirectory::new(&[("alice", "pk-alice", None), ("bob", "pk-bob", None)]);
        let mut tracker = ForgeStatusTracker::from_sources(
            &names(&["secret-alice"]),
            &names(&["alice", "bob", "carol"]),
            &directory,
        );

        tracker.prepare_round(&directory).await;

        let participants = tracker.participants();
        assert_eq!(participants.len(), 3);
        assert_eq!(participants[0].name.as_deref(), Some("alice"));
        assert_eq!(participants[0].public_key.as_deref(), Some("pk-alice"));
        assert_eq!(participants[1].name.as_deref(), Some("bob"));
        assert_eq!(participants[2].name.as_deref(), Some("carol"));
        assert_eq!(participants[2].public_key, None);
        assert_eq!(tracker.resolved_count(), 2);
    }

    #[tokio::test]
    async fn test_prepare_round_resets_state() {
        let directory = StaticDirectory::new(&[("alice", "pk-alice", None)]);
        let mut tracker = ForgeStatusTracker::new(vec![MonitoredParticipant {
            name: Some("alice".to_string()),
            public_key: Some("pk-alice".to_string()),
            position: Some(4),
            time_to_forge: Some(Duration::from_secs(32)),
            state: ForgeState::Failure,
        }]);

        tracker.prepare_round(&directory).await;

        let alice = &tracker.participants()[0];
        assert_eq!(alice.state, ForgeState::Unknown);
        assert_eq!(alice.position, None);
        assert_eq!(alice.time_to_forge, None);
    }

    #[tokio::test]
    async fn test_update_positions_and_classifies() {
        // Anchor slot 20, live slot 22. Timestamps are chosen so that
        // alice forged at slot 20 and bob last forged at slot 10.
        let directory = StaticDirectory::new(&[
            ("alice", "pk-alice", Some(160)),
            ("bob", "pk-bob", Some(80)),
            ("carol", "pk-carol", None),
        ]);
        let mut tracker = ForgeStatusTracker::from_sources(
            &[],
            &names(&["alice", "bob", "carol"]),
            &directory,
        );
        tracker.prepare_round(&directory).await;

        let clock = clock();
        let fixed = names(&["bob", "alice", "carol", "dave"]);
        let live = names(&["carol", "dave", "bob", "alice"]);
        let slots = SlotContext {
            clock: &clock,
            live_slot: 22,
            anchor_slot: 20,
        };

        let entries = tracker.update(&live, &fixed, slots, &directory).await.unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "carol");
        assert_eq!(entries[0].time_to_forge, Duration::ZERO);
        assert_eq!(entries[0].state, ForgeState::Unknown);
        assert_eq!(entries[1].name, "bob");
        assert_eq!(entries[1].position, 2);
        assert_eq!(entries[1].time_to_forge, Duration::from_secs(16));
        assert_eq!(entries[1].state, ForgeState::Failure);
        assert_eq!(entries[2].name, "alice");
        assert_eq!(entries[2].state, ForgeState::Success);

        let bob = &tracker.participants()[1];
        assert_eq!(bob.position, Some(2));
    }

    #[tokio::test]
    async fn test_update_skips_unmonitored_names() {
        let directory = StaticDirectory::new(&[("alice", "pk-alice", None)]);
        let mut tracker = ForgeStatusTracker::new(vec![MonitoredParticipant::by_name("zed")]);
        let clock = clock();
        let order = names(&["alice"]);
        let slots = SlotContext {
            clock: &clock,
            live_slot: 5,
            anchor_slot: 5,
        };

        let entries = tracker.update(&order, &order, slots, &directory).await.unwrap();
        assert!(entries.is_empty());
    }
}
