//! Status-line formatting.
//!
//! Everything here is pure string building except [`StatusSink`], which
//! decides where a finished line goes.

use std::time::Duration;

use console::style;

use crate::config::StatusLevel;
use crate::forge_status::{ForgeState, ForgingEntry};

// Outcome icons render the same in every locale.
pub const CHECK: &str = "✅";
pub const CROSS: &str = "❌";

/// Target of the plain copy logged for lines written to the terminal.
pub const STATUS_COPY_TARGET: &str = "round_monitor::status::copy";

const WAITING_TO_RESTART: &str = "[Waiting to restart]";

/// Which parts of the status line to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Upcoming forgers to list; zero hides the segment.
    pub show_next_forgers: usize,
    pub show_round_time: bool,
    pub ansi: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            show_next_forgers: 3,
            show_round_time: true,
            ansi: true,
        }
    }
}

/// Inputs for one status line.
#[derive(Debug, Clone, Copy)]
pub struct StatusReport<'a> {
    pub live_order: &'a [String],
    pub forging: &'a [ForgingEntry],
    /// Blocks already forged in the current round.
    pub round_position: u64,
    pub max_participants: u32,
    pub round_time_remaining: Duration,
    pub restart_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Normal,
    Bold,
    Dim,
}

fn emphasize(text: &str, emphasis: Emphasis, ansi: bool) -> String {
    if !ansi {
        return text.to_string();
    }
    match emphasis {
        Emphasis::Normal => text.to_string(),
        Emphasis::Bold => style(text).bold().force_styling(true).to_string(),
        Emphasis::Dim => style(text).dim().force_styling(true).to_string(),
    }
}

/// Bold for the next forger, dim for slots that fall into the next round.
fn emphasis_for(position: usize, round_position: u64, max_participants: u32) -> Emphasis {
    if position == 0 {
        Emphasis::Bold
    } else if position as u64 + round_position >= u64::from(max_participants) {
        Emphasis::Dim
    } else {
        Emphasis::Normal
    }
}

/// `1m 5s`, `45s`, `0s`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn state_icon(state: ForgeState) -> String {
    match state {
        ForgeState::Success => format!(" {}", CHECK),
        ForgeState::Failure => format!(" {}", CROSS),
        ForgeState::Unknown => String::new(),
    }
}

/// Render the status line, or `None` when every segment is disabled.
pub fn format_status_line(report: &StatusReport<'_>, options: &ReportOptions) -> Option<String> {
    let mut output = String::new();

    if !report.forging.is_empty() {
        let entries: Vec<String> = report
            .forging
            .iter()
            .map(|entry| {
                let text = format!(
                    "{} ({}){}",
                    format_duration(entry.time_to_forge),
                    entry.name,
                    state_icon(entry.state)
                );
                let emphasis =
                    emphasis_for(entry.position, report.round_position, report.max_participants);
                emphasize(&text, emphasis, options.ansi)
            })
            .collect();
        output.push_str(&format!("Time until we forge: {} ", entries.join(", ")));
    }

    if options.show_next_forgers > 0 {
        let next: Vec<String> = report
            .live_order
            .iter()
            .take(options.show_next_forgers)
            .enumerate()
            .map(|(i, name)| {
                emphasize(
                    name,
                    emphasis_for(i, report.round_position, report.max_participants),
                    options.ansi,
                )
            })
            .collect();
        let position = format!("{}/{}", report.round_position + 1, report.max_participants);

        if report.forging.is_empty() {
            output.push_str(&format!("Next to forge: {} [{}] ", next.join(", "), position));
        } else {
            output.push_str(&format!("[{}: {}] ", position, next.join(", ")));
        }
    }

    if options.show_round_time {
        let remaining = format_duration(report.round_time_remaining);
        if output.is_empty() {
            output.push_str(&format!("Round ends in {} ", remaining));
        } else {
            output.push_str(&format!("[{}] ", remaining));
        }
    }

    if report.restart_requested && !output.is_empty() {
        output.push_str(&emphasize(WAITING_TO_RESTART, Emphasis::Bold, options.ansi));
    }

    let line = output.trim_end();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Render the forging order logged when a round is computed.
///
/// Entries past `positions_remaining` belong to the next round and are dimmed.
pub fn format_forging_order(
    order: &[String],
    positions_remaining: u64,
    new_round: bool,
    ansi: bool,
) -> String {
    let entries: Vec<String> = order
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let emphasis = if i as u64 > positions_remaining {
                Emphasis::Dim
            } else {
                Emphasis::Normal
            };
            emphasize(name, emphasis, ansi)
        })
        .collect();

    let label = if new_round {
        "New forging order"
    } else {
        "Remaining forging order"
    };
    format!("{}: {}", label, entries.join(", "))
}

/// Destination for rendered status lines.
///
/// Styled lines are written straight to the terminal so their escape codes
/// survive, and a stripped copy is logged on [`STATUS_COPY_TARGET`] for the
/// file and JSON layers. Plain lines go through `tracing` at the configured
/// level.
#[derive(Debug, Clone, Copy)]
pub struct StatusSink {
    level: StatusLevel,
    ansi: bool,
}

impl StatusSink {
    pub fn new(level: StatusLevel, ansi: bool) -> Self {
        Self { level, ansi }
    }

    pub fn emit(&self, line: &str) {
        if self.ansi {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            // Terminal writes only fail on a closed stdout.
            let _ = console::Term::stdout().write_line(&format!("{} {}", stamp, line));

            let plain = console::strip_ansi_codes(line);
            match self.level {
                StatusLevel::Error => tracing::error!(target: STATUS_COPY_TARGET, "{}", plain),
                StatusLevel::Warn => tracing::warn!(target: STATUS_COPY_TARGET, "{}", plain),
                StatusLevel::Info => tracing::info!(target: STATUS_COPY_TARGET, "{}", plain),
                StatusLevel::Debug => tracing::debug!(target: STATUS_COPY_TARGET, "{}", plain),
            }
            return;
        }

        match self.level {
            StatusLevel::Error => tracing::error!(target: "round_monitor::status", "{}", line),
            StatusLevel::Warn => tracing::warn!(target: "round_monitor::status", "{}", line),
            StatusLevel::Info => tracing::info!(target: "round_monitor::status", "{}", line),
            StatusLevel::Debug => tracing::debug!(target: "round_monitor::status", "{}", line),
        }
    }
}
