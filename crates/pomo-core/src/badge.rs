//! Passive indicator text.

use serde::{Deserialize, Serialize};

use crate::timer::{Phase, RunState, TimerSnapshot};

/// Colour tag a client uses to paint the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadgeColor {
    Work,
    Break,
}

/// Compact indicator mirroring run-state and remaining time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    /// Empty when stopped, `||` when paused, whole minutes left (rounded up) when running.
    pub text: String,
    pub color: BadgeColor,
}

impl Badge {
    pub fn for_snapshot(snapshot: &TimerSnapshot) -> Self {
        let text = match snapshot.run_state {
            RunState::Stopped => String::new(),
            RunState::Paused => "||".to_string(),
            RunState::Running => snapshot.seconds_remaining.div_ceil(60).to_string(),
        };
        let color = match snapshot.phase {
            Phase::Work => BadgeColor::Work,
            Phase::Break => BadgeColor::Break,
        };
        Self { text, color }
    }
}
