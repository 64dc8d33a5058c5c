//! The timer state machine.
//!
//! `TimerSnapshot` is the single authoritative timer state. Transitions are
//! pure: they mutate the in-memory snapshot and report what happened, and the
//! daemon decides what to persist, broadcast, or schedule as a result.
//!
//! Run-state and phase are independent axes:
//!
//! ```text
//!            start                pause
//!  Stopped ─────────▶ Running ─────────▶ Paused
//!     ▲                  │  ▲               │
//!     │   phase complete │  └───── start ───┘
//!     └──────────────────┘
//!   reset (from any state) → Stopped / Work / full work interval
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::settings::DurationConfig;

// ============================================================================
// Phase & Run State
// ============================================================================

/// Which interval type is active, or was last active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Work,
    Break,
}

impl Phase {
    /// The phase that follows this one.
    pub fn next(self) -> Self {
        match self {
            Self::Work => Self::Break,
            Self::Break => Self::Work,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of the countdown.
///
/// `Running` holds exactly when a countdown driver is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transition Outcomes
// ============================================================================

/// Result of `TimerSnapshot::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Already running; nothing changed and no new driver is needed.
    AlreadyRunning,
    /// Resumed from pause with the remaining time untouched.
    Resumed,
    /// Started from stopped. `reloaded` is true when an exhausted countdown
    /// was refilled from the configured duration first.
    Started { reloaded: bool },
}

impl StartOutcome {
    /// Whether the caller must start a countdown driver.
    pub fn needs_driver(&self) -> bool {
        !matches!(self, Self::AlreadyRunning)
    }
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer is not running; the tick was ignored.
    Idle,
    /// One second elapsed and time remains.
    Counting { seconds_remaining: u32 },
    /// The countdown reached zero; the phase must be completed.
    Elapsed,
}

/// What a phase completion did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompletion {
    /// The phase that just finished.
    pub completed: Phase,
    /// The phase the timer switched to.
    pub next: Phase,
}

impl PhaseCompletion {
    /// Only finished work intervals count toward productivity.
    pub fn counts_toward_history(&self) -> bool {
        self.completed == Phase::Work
    }
}

// ============================================================================
// Timer Snapshot
// ============================================================================

/// The authoritative, persisted timer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub run_state: RunState,
    pub seconds_remaining: u32,
    /// Diagnostic only; never used to recover elapsed time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_persisted_at: Option<DateTime<Utc>>,
}

impl TimerSnapshot {
    /// A stopped work interval of full length.
    pub fn new(durations: &DurationConfig) -> Self {
        Self {
            phase: Phase::Work,
            run_state: RunState::Stopped,
            seconds_remaining: durations.seconds_for(Phase::Work),
            last_persisted_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    /// Starts or resumes the countdown. Idempotent while running.
    pub fn start(&mut self, durations: &DurationConfig) -> StartOutcome {
        match self.run_state {
            RunState::Running => StartOutcome::AlreadyRunning,
            RunState::Paused => {
                self.run_state = RunState::Running;
                StartOutcome::Resumed
            }
            RunState::Stopped => {
                let reloaded = self.seconds_remaining == 0;
                if reloaded {
                    self.seconds_remaining = durations.seconds_for(self.phase);
                }
                self.run_state = RunState::Running;
                StartOutcome::Started { reloaded }
            }
        }
    }

    /// Pauses a running countdown. Returns false (and changes nothing) otherwise.
    pub fn pause(&mut self) -> bool {
        if self.run_state != RunState::Running {
            return false;
        }
        self.run_state = RunState::Paused;
        true
    }

    /// Back to a stopped, full-length work interval.
    pub fn reset(&mut self, durations: &DurationConfig) {
        self.run_state = RunState::Stopped;
        self.phase = Phase::Work;
        self.seconds_remaining = durations.seconds_for(Phase::Work);
    }

    /// Advances the countdown by one second.
    ///
    /// Never goes below zero: reaching zero reports `Elapsed` and the caller
    /// must follow up with `complete_phase`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.run_state != RunState::Running {
            return TickOutcome::Idle;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            TickOutcome::Counting {
                seconds_remaining: self.seconds_remaining,
            }
        } else {
            TickOutcome::Elapsed
        }
    }

    /// Stops the countdown, flips the phase, and loads the next interval.
    ///
    /// Whether the next phase starts automatically is the caller's decision.
    pub fn complete_phase(&mut self, durations: &DurationConfig) -> PhaseCompletion {
        let completed = self.phase;
        let next = completed.next();

        self.run_state = RunState::Stopped;
        self.phase = next;
        self.seconds_remaining = durations.seconds_for(next);

        PhaseCompletion { completed, next }
    }

    /// Applies the restart rule: a driver never survives the process, so a
    /// persisted `Running` becomes `Stopped` with phase and time preserved.
    ///
    /// Returns true if the snapshot was downgraded.
    pub fn recover_after_restart(&mut self) -> bool {
        if self.run_state != RunState::Running {
            return false;
        }
        self.run_state = RunState::Stopped;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn durations() -> DurationConfig {
        DurationConfig::new(25, 5)
    }

    #[test]
    fn test_new_snapshot_is_stopped_work() {
        let snapshot = TimerSnapshot::new(&durations());
        assert_eq!(snapshot.phase, Phase::Work);
        assert_eq!(snapshot.run_state, RunState::Stopped);
        assert_eq!(snapshot.seconds_remaining, 1500);
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut snapshot = TimerSnapshot::new(&durations());
        assert_eq!(
            snapshot.start(&durations()),
            StartOutcome::Started { reloaded: false }
        );
        assert_eq!(snapshot.start(&durations()), StartOutcome::AlreadyRunning);
        assert!(!StartOutcome::AlreadyRunning.needs_driver());
        assert_eq!(snapshot.seconds_remaining, 1500);
    }

    #[test]
    fn test_countdown_is_monotonic_and_never_negative() {
        let config = DurationConfig::new(1, 1);
        let mut snapshot = TimerSnapshot::new(&config);
        snapshot.start(&config);

        let mut previous = snapshot.seconds_remaining;
        for _ in 0..59 {
            match snapshot.tick() {
                TickOutcome::Counting { seconds_remaining } => {
                    assert_eq!(seconds_remaining, previous - 1);
                    previous = seconds_remaining;
                }
                other => panic!("unexpected tick outcome {other:?}"),
            }
        }
        assert_eq!(snapshot.tick(), TickOutcome::Elapsed);
        assert_eq!(snapshot.seconds_remaining, 0);

        // A stray tick at zero stays at zero
        assert_eq!(snapshot.tick(), TickOutcome::Elapsed);
        assert_eq!(snapshot.seconds_remaining, 0);
    }

    #[test]
    fn test_tick_ignored_unless_running() {
        let mut snapshot = TimerSnapshot::new(&durations());
        assert_eq!(snapshot.tick(), TickOutcome::Idle);
        assert_eq!(snapshot.seconds_remaining, 1500);

        snapshot.start(&durations());
        snapshot.pause();
        assert_eq!(snapshot.tick(), TickOutcome::Idle);
    }

    #[test]
    fn test_pause_when_stopped_is_noop() {
        let mut snapshot = TimerSnapshot::new(&durations());
        let before = snapshot.clone();
        assert!(!snapshot.pause());
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_resume_preserves_remaining_time() {
        let mut snapshot = TimerSnapshot::new(&durations());
        snapshot.start(&durations());
        snapshot.tick();
        snapshot.tick();
        assert!(snapshot.pause());
        assert_eq!(snapshot.run_state, RunState::Paused);

        assert_eq!(snapshot.start(&durations()), StartOutcome::Resumed);
        assert_eq!(snapshot.seconds_remaining, 1498);
    }

    #[test]
    fn test_start_reloads_exhausted_timer() {
        let mut snapshot = TimerSnapshot {
            phase: Phase::Break,
            run_state: RunState::Stopped,
            seconds_remaining: 0,
            last_persisted_at: None,
        };
        assert_eq!(
            snapshot.start(&durations()),
            StartOutcome::Started { reloaded: true }
        );
        assert_eq!(snapshot.seconds_remaining, 300);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut snapshot = TimerSnapshot::new(&durations());
        snapshot.start(&durations());
        snapshot.tick();
        snapshot.complete_phase(&durations());
        snapshot.start(&durations());

        snapshot.reset(&durations());
        assert_eq!(snapshot.phase, Phase::Work);
        assert_eq!(snapshot.run_state, RunState::Stopped);
        assert_eq!(snapshot.seconds_remaining, 1500);
    }

    #[test]
    fn test_phase_alternation() {
        let mut snapshot = TimerSnapshot::new(&durations());

        let first = snapshot.complete_phase(&durations());
        assert_eq!(first.completed, Phase::Work);
        assert!(first.counts_toward_history());
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(snapshot.seconds_remaining, 300);
        assert_eq!(snapshot.run_state, RunState::Stopped);

        let second = snapshot.complete_phase(&durations());
        assert_eq!(second.completed, Phase::Break);
        assert!(!second.counts_toward_history());
        assert_eq!(snapshot.phase, Phase::Work);
        assert_eq!(snapshot.seconds_remaining, 1500);
    }

    #[test]
    fn test_recover_after_restart_downgrades_running() {
        let mut snapshot = TimerSnapshot {
            phase: Phase::Break,
            run_state: RunState::Running,
            seconds_remaining: 123,
            last_persisted_at: None,
        };
        assert!(snapshot.recover_after_restart());
        assert_eq!(snapshot.run_state, RunState::Stopped);
        assert_eq!(snapshot.phase, Phase::Break);
        assert_eq!(snapshot.seconds_remaining, 123);

        // Paused survives a restart untouched
        snapshot.run_state = RunState::Paused;
        assert!(!snapshot.recover_after_restart());
        assert_eq!(snapshot.run_state, RunState::Paused);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = TimerSnapshot::new(&durations());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["runState"], "stopped");
        assert_eq!(json["phase"], "work");
        assert_eq!(json["secondsRemaining"], 1500);
        assert!(json.get("lastPersistedAt").is_none());
    }
}
