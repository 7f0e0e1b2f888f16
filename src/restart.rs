//! Safe-restart control.
//!
//! A restart moves through three phases stored in one atomic byte:
//!
//! ```text
//! Idle --request--> Requested --commit--> Committed
//!   ^                   |
//!   +------cancel-------+
//! ```
//!
//! Every transition is a compare-and-swap, so the control server and the
//! evaluation loop can race without a lock. Once committed, a restart can no
//! longer be cancelled and further requests are rejected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use monitor_common::ProcessControl;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::RestartError;

const IDLE: u8 = 0;
const REQUESTED: u8 = 1;
const COMMITTED: u8 = 2;

/// Observable restart phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartPhase {
    #[default]
    Idle,
    Requested,
    Committed,
}

/// Shared restart request flag.
#[derive(Debug, Default)]
pub struct RestartControl {
    state: AtomicU8,
}

impl RestartControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RestartPhase {
        match self.state.load(Ordering::Acquire) {
            IDLE => RestartPhase::Idle,
            REQUESTED => RestartPhase::Requested,
            _ => RestartPhase::Committed,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.phase() == RestartPhase::Requested
    }

    pub fn request(&self) -> Result<(), RestartError> {
        match self
            .state
            .compare_exchange(IDLE, REQUESTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!("Safe restart requested");
                Ok(())
            }
            Err(REQUESTED) => Err(RestartError::AlreadyRequested),
            Err(_) => Err(RestartError::AlreadyCommitted),
        }
    }

    pub fn cancel(&self) -> Result<(), RestartError> {
        match self
            .state
            .compare_exchange(REQUESTED, IDLE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!("Safe restart cancelled");
                Ok(())
            }
            Err(IDLE) => Err(RestartError::NothingPending),
            Err(_) => Err(RestartError::AlreadyCommitted),
        }
    }

    /// Move a pending request to committed. Returns false if no request was
    /// pending at the moment of the swap.
    fn commit(&self) -> bool {
        self.state
            .compare_exchange(REQUESTED, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// What a committed restart does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPlan {
    /// Restart each named process that is currently running, in order.
    Processes(Vec<String>),
    /// Run a single shell command.
    Command(String),
}

impl RestartPlan {
    /// The node's forger, relay and core processes for a network token.
    pub fn for_token(token: &str) -> Self {
        Self::Processes(vec![
            format!("{}-forger", token),
            format!("{}-relay", token),
            format!("{}-core", token),
        ])
    }
}

/// Inputs to the restart safety check for one evaluation cycle.
#[derive(Debug, Clone, Copy)]
pub struct RestartWindow<'a> {
    /// Monitored participants whose name and identity are both known.
    pub resolved_participants: usize,
    /// Time to forge of each monitored participant in the live order.
    pub forging_times: &'a [Duration],
    pub round_time_remaining: Duration,
}

/// Nothing is monitored, so no slot can be missed by restarting.
pub fn nothing_monitored(window: &RestartWindow<'_>) -> bool {
    window.resolved_participants == 0
}

/// No monitored participant forges within `buffer` and the round does not end
/// within `buffer`.
pub fn clear_of_forging(window: &RestartWindow<'_>, buffer: Duration) -> bool {
    window.forging_times.iter().all(|t| *t >= buffer) && window.round_time_remaining >= buffer
}

pub fn is_safe_to_restart(window: &RestartWindow<'_>, buffer: Duration) -> bool {
    nothing_monitored(window) || clear_of_forging(window, buffer)
}

/// Decides when a pending restart may proceed and carries it out.
pub struct RestartCoordinator {
    control: Arc<RestartControl>,
    processes: Arc<dyn ProcessControl>,
    plan: RestartPlan,
    time_buffer: Duration,
}

impl RestartCoordinator {
    pub fn new(
        control: Arc<RestartControl>,
        processes: Arc<dyn ProcessControl>,
        plan: RestartPlan,
        time_buffer: Duration,
    ) -> Self {
        Self {
            control,
            processes,
            plan,
            time_buffer,
        }
    }

    pub fn control(&self) -> &Arc<RestartControl> {
        &self.control
    }

    pub fn phase(&self) -> RestartPhase {
        self.control.phase()
    }

    pub fn is_requested(&self) -> bool {
        self.control.is_requested()
    }

    /// Commit a pending restart if `window` is safe.
    ///
    /// A cancel that lands between the safety check and the swap wins.
    pub fn try_commit(&self, window: &RestartWindow<'_>) -> bool {
        if !self.control.is_requested() {
            return false;
        }
        if !is_safe_to_restart(window, self.time_buffer) {
            debug!(
                buffer_secs = self.time_buffer.as_secs(),
                round_time_remaining_secs = window.round_time_remaining.as_secs(),
                "Restart deferred, forging too close"
            );
            return false;
        }
        self.control.commit()
    }

    /// Run the restart plan. Failures are logged and skipped.
    pub async fn execute(&self) {
        info!("Round monitor is safely restarting the node now");
        match &self.plan {
            RestartPlan::Processes(names) => {
                for name in names {
                    match self.processes.is_running(name).await {
                        Ok(true) => match self.processes.restart(name).await {
                            Ok(()) => info!(process = %name, "Process restarted"),
                            Err(e) => warn!(process = %name, error = %e, "Process restart failed"),
                        },
                        Ok(false) => debug!(process = %name, "Process not running, skipping"),
                        Err(e) => warn!(process = %name, error = %e, "Failed to query process"),
                    }
                }
            }
            RestartPlan::Command(command) => {
                if let Err(e) = self.processes.run_command(command).await {
                    warn!(command = %command, error = %e, "Restart command failed");
                }
            }
        }
    }
}
