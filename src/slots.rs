//! Slot arithmetic against the network epoch.

use std::time::Duration;

use chrono::{DateTime, Utc};
use monitor_common::Milestone;

/// A run of slots sharing one block time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    /// Network time of the span's first slot, in seconds.
    start: u64,
    first_slot: u64,
    block_time: u64,
}

impl Span {
    fn slot_at_ms(&self, ms: u64) -> u64 {
        self.first_slot + ms.saturating_sub(self.start * 1000) / self.slot_ms()
    }

    fn slot_ms(&self) -> u64 {
        self.block_time * 1000
    }
}

/// Converts wall-clock time and block timestamps into slot numbers.
///
/// Block timestamps are seconds since the network epoch; the live slot is
/// derived from the current time the same way. Each block-time change opens
/// a new span that continues the slot count where the previous one ended, so
/// slot numbers stay monotonic across milestones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotClock {
    epoch: DateTime<Utc>,
    spans: Vec<Span>,
}

impl SlotClock {
    pub fn new(epoch: DateTime<Utc>, block_time: u32) -> Self {
        Self {
            epoch,
            spans: vec![Span {
                start: 0,
                first_slot: 0,
                block_time: u64::from(block_time.max(1)),
            }],
        }
    }

    pub fn from_milestone(milestone: &Milestone) -> Self {
        Self::new(milestone.epoch, milestone.block_time)
    }

    /// Switch to `block_time` after the slot holding `last_timestamp`, the
    /// timestamp of the last block forged under the current block time.
    pub fn push_span(&mut self, last_timestamp: u64, block_time: u32) {
        let current = self.current_span();
        let first_slot = current.slot_at_ms(last_timestamp.saturating_mul(1000)) + 1;
        let start = current.start + (first_slot - current.first_slot) * current.block_time;

        self.spans.push(Span {
            start,
            first_slot,
            block_time: u64::from(block_time.max(1)),
        });
    }

    /// Block-time changes folded into the clock so far.
    pub fn changes(&self) -> usize {
        self.spans.len() - 1
    }

    /// Block time of the latest span.
    pub fn block_time(&self) -> Duration {
        Duration::from_secs(self.current_span().block_time)
    }

    /// Milliseconds elapsed since the network epoch, zero before it.
    pub fn network_time_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.epoch).num_milliseconds().max(0) as u64
    }

    /// Slot containing a block timestamp.
    pub fn slot_at(&self, timestamp: u64) -> u64 {
        let ms = timestamp.saturating_mul(1000);
        self.span_at_ms(ms).slot_at_ms(ms)
    }

    /// Live slot at `now`.
    pub fn current_slot(&self, now: DateTime<Utc>) -> u64 {
        let ms = self.network_time_ms(now);
        self.span_at_ms(ms).slot_at_ms(ms)
    }

    /// Time left until the next slot boundary; never zero.
    pub fn time_until_next_slot(&self, now: DateTime<Utc>) -> Duration {
        let ms = self.network_time_ms(now);
        let span = self.span_at_ms(ms);
        let elapsed = ms.saturating_sub(span.start * 1000) % span.slot_ms();
        Duration::from_millis(span.slot_ms() - elapsed)
    }

    fn current_span(&self) -> Span {
        self.spans[self.spans.len() - 1]
    }

    fn span_at_ms(&self, ms: u64) -> Span {
        self.spans
            .iter()
            .rev()
            .find(|span| span.start * 1000 <= ms)
            .copied()
            .unwrap_or(self.spans[0])
    }
}
