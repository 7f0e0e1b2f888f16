//! Forging-order rotation and the per-round order cache.

use monitor_common::{Participant, RoundInfo};

use crate::errors::MonitorError;

/// Rotate `participants` so that the one scheduled at `reference_slot` comes
/// first, keeping cyclic order.
///
/// The scheduled index is `reference_slot mod max_participants`. When the
/// sequence is shorter than `max_participants` the index wraps again on the
/// sequence length and the result never repeats an entry.
pub fn forging_order<T: Clone>(reference_slot: u64, participants: &[T], max_participants: u32) -> Vec<T> {
    if participants.is_empty() || max_participants == 0 {
        return Vec::new();
    }

    let len = participants.len();
    let start = (reference_slot % u64::from(max_participants)) as usize % len;
    let take = len.min(max_participants as usize);

    participants[start..]
        .iter()
        .chain(participants[..start].iter())
        .take(take)
        .cloned()
        .collect()
}

/// Slot the live order is anchored at.
///
/// If the last applied block already consumed the live slot, the next slot is
/// the first one still open.
pub fn live_anchor_slot(live_slot: u64, last_block_slot: u64) -> u64 {
    if last_block_slot == live_slot {
        live_slot + 1
    } else {
        live_slot
    }
}

/// Canonical forging sequence of one round, plus its anchor slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOrderCache {
    round: RoundInfo,
    names: Vec<String>,
    public_keys: Vec<String>,
    anchor_slot: u64,
}

impl RoundOrderCache {
    pub fn new(
        round: RoundInfo,
        participants: &[Participant],
        anchor_slot: u64,
    ) -> Result<Self, MonitorError> {
        if participants.is_empty() {
            return Err(MonitorError::EmptyRound { round: round.round });
        }

        Ok(Self {
            round,
            names: participants.iter().map(|p| p.name.clone()).collect(),
            public_keys: participants.iter().map(|p| p.public_key.clone()).collect(),
            anchor_slot,
        })
    }

    pub fn round(&self) -> &RoundInfo {
        &self.round
    }

    pub fn anchor_slot(&self) -> u64 {
        self.anchor_slot
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn public_keys(&self) -> &[String] {
        &self.public_keys
    }

    pub fn public_key_of(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.public_keys[i].as_str())
    }

    /// Whether this cache belongs to `round`.
    pub fn is_for(&self, round: u64) -> bool {
        self.round.round == round
    }

    /// Names rotated to `reference_slot`.
    pub fn order(&self, reference_slot: u64) -> Vec<String> {
        forging_order(reference_slot, &self.names, self.round.max_participants)
    }

    /// Names rotated to the anchor slot; stable for the whole round.
    pub fn fixed_order(&self) -> Vec<String> {
        self.order(self.anchor_slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn participant(name: &str) -> Participant {
        Participant {
            name: name.to_string(),
            public_key: format!("pk-{}", name),
            last_block: None,
        }
    }

    fn round(max_participants: u32) -> RoundInfo {
        RoundInfo {
            round: 7,
            round_height: 31,
            next_round: 8,
            max_participants,
        }
    }

    #[test]
    fn test_order_anchored_at_index_two() {
        let seq = names(&["A", "B", "C", "D", "E"]);
        assert_eq!(forging_order(2, &seq, 5), names(&["C", "D", "E", "A", "B"]));
    }

    #[test]
    fn test_order_is_rotation_for_every_slot() {
        let seq = names(&["A", "B", "C", "D", "E", "F", "G"]);
        let n = seq.len() as u32;
        for k in 0..50u64 {
            let order = forging_order(k, &seq, n);
            let start = (k % u64::from(n)) as usize;
            assert_eq!(order.len(), seq.len());
            for (i, name) in order.iter().enumerate() {
                assert_eq!(name, &seq[(start + i) % seq.len()]);
            }
        }
    }

    #[test]
    fn test_order_is_periodic_in_max_participants() {
        let seq = names(&["A", "B", "C", "D", "E"]);
        for k in 0..20u64 {
            assert_eq!(forging_order(k, &seq, 5), forging_order(k + 5, &seq, 5));
        }
    }

    #[test]
    fn test_order_truncates_to_max_participants() {
        let seq = names(&["A", "B", "C", "D", "E"]);
        assert_eq!(forging_order(1, &seq, 3), names(&["B", "C", "D"]));
    }

    #[test]
    fn test_order_short_sequence_has_no_duplicates() {
        let seq = names(&["A", "B", "C"]);
        assert_eq!(forging_order(4, &seq, 5), names(&["B", "C", "A"]));
    }

    #[test]
    fn test_order_empty_inputs() {
        let empty: Vec<String> = Vec::new();
        assert!(forging_order(3, &empty, 5).is_empty());
        assert!(forging_order(3, &names(&["A"]), 0).is_empty());
    }

    #[test]
    fn test_live_anchor_skips_consumed_slot() {
        assert_eq!(live_anchor_slot(100, 100), 101);
        assert_eq!(live_anchor_slot(100, 98), 100);
    }

    #[test]
    fn test_cache_rejects_empty_round() {
        let err = RoundOrderCache::new(round(5), &[], 10).unwrap_err();
        assert!(matches!(err, MonitorError::EmptyRound { round: 7 }));
    }

    #[test]
    fn test_cache_orders_and_keys_are_parallel() {
        let participants: Vec<Participant> =
            ["A", "B", "C", "D", "E"].iter().map(|n| participant(n)).collect();
        let cache = RoundOrderCache::new(round(5), &participants, 31).unwrap();

        assert_eq!(cache.names(), names(&["A", "B", "C", "D", "E"]).as_slice());
        assert_eq!(cache.public_keys()[3], "pk-D");
        assert_eq!(cache.public_key_of("C"), Some("pk-C"));
        assert_eq!(cache.public_key_of("Z"), None);
        assert!(cache.is_for(7));
        assert!(!cache.is_for(8));
    }

    #[test]
    fn test_fixed_order_uses_anchor_slot() {
        let participants: Vec<Participant> =
            ["A", "B", "C", "D", "E"].iter().map(|n| participant(n)).collect();
        let cache = RoundOrderCache::new(round(5), &participants, 31).unwrap();

        assert_eq!(cache.fixed_order(), names(&["B", "C", "D", "E", "A"]));
        assert_eq!(cache.fixed_order(), cache.order(36));
        assert_eq!(cache.order(33), names(&["D", "E", "A", "B", "C"]));
    }
}
