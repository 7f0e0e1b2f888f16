//! The round monitor.
//!
//! [`Monitor`] owns all per-round state. It is booted once against the
//! chain, told about applied blocks, and asked to evaluate once per slot:
//!
//! 1. On a new round it resolves the monitored participants, fetches the
//!    round's canonical order and fixes the round's anchor slot.
//! 2. On each new slot it rotates the order to the live slot, classifies the
//!    monitored participants, decides whether a pending restart may commit,
//!    and otherwise renders a status line.
//!
//! Every evaluation also publishes a [`StatusSnapshot`] on a watch channel for
//! the control server.

use std::sync::Arc;
use std::time::Duration;

use monitor_common::{BlockData, ChainState, Clock, Directory, Milestones};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::StatusLevel;
use crate::errors::MonitorError;
use crate::forge_status::{ForgeStatusTracker, ForgingEntry, SlotContext};
use crate::reporter::{
    ReportOptions, StatusReport, StatusSink, format_forging_order, format_status_line,
};
use crate::restart::{RestartCoordinator, RestartPhase, RestartWindow};
use crate::round::{RoundOrderCache, forging_order, live_anchor_slot};
use crate::slots::SlotClock;

/// Latest evaluation result, served by the control server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub height: Option<u64>,
    pub round: Option<u64>,
    pub slot: Option<u64>,
    pub round_position: Option<u64>,
    pub max_participants: Option<u32>,
    pub round_time_remaining_secs: Option<u64>,
    pub next_forgers: Vec<String>,
    pub forging: Vec<ForgingEntry>,
    pub restart: RestartPhase,
    pub status_line: Option<String>,
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Already evaluated this slot.
    SlotUnchanged,
    /// The last block already filled the live slot.
    Deferred,
    /// Status computed; carries the uncolored status line, if any.
    Reported(Option<String>),
    /// A pending restart was committed and must now be executed.
    RestartCommitted,
}

/// Collaborators handed to the monitor at boot.
pub struct MonitorDeps {
    pub chain: Arc<dyn ChainState>,
    pub directory: Arc<dyn Directory>,
    pub clock: Arc<dyn Clock>,
    pub restart: RestartCoordinator,
    pub status: watch::Sender<StatusSnapshot>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorSettings {
    pub show_forging_order: bool,
    pub status_level: StatusLevel,
    pub report: ReportOptions,
}

pub struct Monitor {
    chain: Arc<dyn ChainState>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    restart: RestartCoordinator,
    status: watch::Sender<StatusSnapshot>,
    settings: MonitorSettings,
    sink: StatusSink,
    tracker: ForgeStatusTracker,
    milestones: Milestones,
    slot_clock: SlotClock,
    round: Option<RoundOrderCache>,
    last_slot: Option<u64>,
}

impl Monitor {
    /// Read the chain and compute the first round.
    pub async fn boot(
        deps: MonitorDeps,
        settings: MonitorSettings,
        tracker: ForgeStatusTracker,
    ) -> Result<Self, MonitorError> {
        let milestones = deps.chain.milestones().await.map_err(MonitorError::Chain)?;
        let last = deps.chain.last_block().await.map_err(MonitorError::Chain)?;
        let slot_clock = SlotClock::from_milestone(milestones.at(1));

        let mut monitor = Self {
            chain: deps.chain,
            directory: deps.directory,
            clock: deps.clock,
            restart: deps.restart,
            status: deps.status,
            settings,
            sink: StatusSink::new(settings.status_level, settings.report.ansi),
            tracker,
            milestones,
            slot_clock,
            round: None,
            last_slot: None,
        };

        monitor.sync_slot_clock(last.height).await?;
        info!(
            height = last.height,
            monitored = monitor.tracker.participants().len(),
            "Round monitor starting"
        );
        monitor.start_round(&last).await?;
        Ok(monitor)
    }

    pub fn tracker(&self) -> &ForgeStatusTracker {
        &self.tracker
    }

    pub fn round(&self) -> Option<&RoundOrderCache> {
        self.round.as_ref()
    }

    pub fn restart(&self) -> &RestartCoordinator {
        &self.restart
    }

    /// Handle an applied block. Returns true if a new round was computed.
    pub async fn on_block_applied(&mut self, block: &BlockData) -> Result<bool, MonitorError> {
        self.sync_slot_clock(block.height).await?;

        let next = self.milestones.round_at(block.height + 1);
        if self.round.as_ref().is_some_and(|cache| cache.is_for(next.round)) {
            return Ok(false);
        }

        self.start_round(block).await?;
        Ok(true)
    }

    /// Re-read the last block after missed notifications.
    pub async fn resync(&mut self) -> Result<bool, MonitorError> {
        let last = self.chain.last_block().await.map_err(MonitorError::Chain)?;
        self.on_block_applied(&last).await
    }

    /// Fold the block-time changes active at `height` into the slot clock.
    async fn sync_slot_clock(&mut self, height: u64) -> Result<(), MonitorError> {
        let changes: Vec<(u64, u32)> = self
            .milestones
            .block_time_changes()
            .filter(|m| m.height <= height)
            .map(|m| (m.height, m.block_time))
            .collect();

        // A reorg below a change invalidates the spans after it.
        if changes.len() < self.slot_clock.changes() {
            self.slot_clock = SlotClock::from_milestone(self.milestones.at(1));
        }

        for (change_height, block_time) in changes.into_iter().skip(self.slot_clock.changes()) {
            let previous = change_height - 1;
            let block = self
                .chain
                .block_at(previous)
                .await
                .map_err(MonitorError::Chain)?
                .ok_or(MonitorError::MissingBlock { height: previous })?;
            self.slot_clock.push_span(block.timestamp, block_time);
            debug!(height = change_height, block_time, "Block time changed");
        }
        Ok(())
    }

    async fn start_round(&mut self, last_block: &BlockData) -> Result<(), MonitorError> {
        let next_height = last_block.height + 1;
        let round = self.milestones.round_at(next_height);

        self.tracker.prepare_round(self.directory.as_ref()).await;

        let participants = self
            .directory
            .active_participants(&round)
            .await
            .map_err(MonitorError::Directory)?;
        let live_slot = self.slot_clock.current_slot(self.clock.now());

        if self.settings.show_forging_order {
            let names: Vec<String> = participants.iter().map(|p| p.name.clone()).collect();
            let anchor = live_anchor_slot(live_slot, self.slot_clock.slot_at(last_block.timestamp));
            let order = forging_order(anchor, &names, round.max_participants);
            let position = next_height.saturating_sub(round.round_height);
            let remaining = u64::from(round.max_participants).saturating_sub(position + 1);
            let line = format_forging_order(
                &order,
                remaining,
                self.milestones.is_new_round(next_height),
                self.settings.report.ansi,
            );
            self.sink.emit(&line);
        }

        let previous = match round.round_height.checked_sub(1).filter(|h| *h > 0) {
            Some(height) => self
                .chain
                .block_at(height)
                .await
                .map_err(MonitorError::Chain)?,
            None => None,
        };
        let anchor_slot = match previous {
            Some(block) => self.slot_clock.slot_at(block.timestamp) + 1,
            None => live_slot + 1,
        };

        let cache = RoundOrderCache::new(round, &participants, anchor_slot)?;
        info!(
            round = round.round,
            round_height = round.round_height,
            participants = participants.len(),
            anchor_slot,
            "Round order computed"
        );
        self.round = Some(cache);
        Ok(())
    }

    /// Run one evaluation cycle.
    pub async fn evaluate(&mut self) -> Result<CycleOutcome, MonitorError> {
        let live_slot = self.slot_clock.current_slot(self.clock.now());
        if self.last_slot == Some(live_slot) {
            return Ok(CycleOutcome::SlotUnchanged);
        }
        self.last_slot = Some(live_slot);

        let last = self.chain.last_block().await.map_err(MonitorError::Chain)?;
        if self.slot_clock.slot_at(last.timestamp) == live_slot {
            debug!(slot = live_slot, height = last.height, "Slot already filled");
            return Ok(CycleOutcome::Deferred);
        }

        let cache = self.round.as_ref().ok_or(MonitorError::RoundNotComputed)?;
        let round = *cache.round();
        let max = u64::from(round.max_participants).max(1);
        let round_position = (last.height + 1).saturating_sub(round.round_height) % max;
        let round_time_remaining =
            self.slot_clock.block_time() * max.saturating_sub(round_position + 1) as u32;

        let live_order = cache.order(live_slot);
        let fixed_order = cache.fixed_order();
        let slots = SlotContext {
            clock: &self.slot_clock,
            live_slot,
            anchor_slot: cache.anchor_slot(),
        };
        let forging = self
            .tracker
            .update(&live_order, &fixed_order, slots, self.directory.as_ref())
            .await?;

        let forging_times: Vec<Duration> = forging.iter().map(|e| e.time_to_forge).collect();
        let window = RestartWindow {
            resolved_participants: self.tracker.resolved_count(),
            forging_times: &forging_times,
            round_time_remaining,
        };

        let mut snapshot = StatusSnapshot {
            height: Some(last.height),
            round: Some(round.round),
            slot: Some(live_slot),
            round_position: Some(round_position),
            max_participants: Some(round.max_participants),
            round_time_remaining_secs: Some(round_time_remaining.as_secs()),
            next_forgers: live_order.clone(),
            forging: forging.clone(),
            restart: self.restart.phase(),
            status_line: None,
        };

        if self.restart.try_commit(&window) {
            info!(round = round.round, slot = live_slot, "Safe to restart");
            snapshot.restart = RestartPhase::Committed;
            self.status.send_replace(snapshot);
            return Ok(CycleOutcome::RestartCommitted);
        }

        let report = StatusReport {
            live_order: &live_order,
            forging: &forging,
            round_position,
            max_participants: round.max_participants,
            round_time_remaining,
            restart_requested: self.restart.is_requested(),
        };
        let plain_options = ReportOptions {
            ansi: false,
            ..self.settings.report
        };
        let plain = format_status_line(&report, &plain_options);
        let rendered = if self.settings.report.ansi {
            format_status_line(&report, &self.settings.report)
        } else {
            plain.clone()
        };
        if let Some(line) = &rendered {
            self.sink.emit(line);
        }

        snapshot.restart = self.restart.phase();
        snapshot.status_line = plain.clone();
        self.status.send_replace(snapshot);

        Ok(CycleOutcome::Reported(plain))
    }

    /// Time until the next slot boundary, used to arm the scheduler.
    pub fn time_until_next_slot(&self) -> Duration {
        self.slot_clock.time_until_next_slot(self.clock.now())
    }

    pub async fn execute_restart(&self) {
        self.restart.execute().await;
    }
}
