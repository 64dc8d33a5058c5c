//! Read-only projection of the timer for clients.

use serde::{Deserialize, Serialize};

use crate::badge::Badge;
use crate::timer::{Phase, RunState, TimerSnapshot};

/// What a UI surface needs to render the timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub seconds_remaining: u32,
    pub run_state: RunState,
    pub phase: Phase,
    /// Completed work intervals today.
    pub completed_pomodoros: u32,
    pub badge: Badge,
}

impl TimerView {
    pub fn new(snapshot: &TimerSnapshot, completed_pomodoros: u32) -> Self {
        Self {
            seconds_remaining: snapshot.seconds_remaining,
            run_state: snapshot.run_state,
            phase: snapshot.phase,
            completed_pomodoros,
            badge: Badge::for_snapshot(snapshot),
        }
    }

    /// Remaining time as `MM:SS`.
    pub fn clock_text(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.seconds_remaining / 60,
            self.seconds_remaining % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DurationConfig;

    #[test]
    fn test_view_mirrors_snapshot() {
        let mut snapshot = TimerSnapshot::new(&DurationConfig::new(25, 5));
        snapshot.start(&DurationConfig::new(25, 5));
        snapshot.tick();

        let view = TimerView::new(&snapshot, 3);
        assert_eq!(view.seconds_remaining, 1499);
        assert_eq!(view.run_state, RunState::Running);
        assert_eq!(view.completed_pomodoros, 3);
        assert_eq!(view.badge.text, "25");
        assert_eq!(view.clock_text(), "24:59");
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let snapshot = TimerSnapshot::new(&DurationConfig::default());
        let json = serde_json::to_value(TimerView::new(&snapshot, 0)).unwrap();
        assert_eq!(json["secondsRemaining"], 1500);
        assert_eq!(json["runState"], "stopped");
        assert_eq!(json["completedPomodoros"], 0);
        assert_eq!(json["badge"]["text"], "");
        assert_eq!(json["badge"]["color"], "work");
    }
}
