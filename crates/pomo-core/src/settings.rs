//! User-facing timer settings.
//!
//! Durations arrive from clients as arbitrary JSON (numbers, numeric strings,
//! or garbage typed into a settings field). Bad input is never an error: it is
//! coerced to a usable value so the timer always has a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timer::Phase;

/// Default length of a work interval, in minutes.
pub const DEFAULT_WORK_MINUTES: u32 = 25;

/// Default length of a break interval, in minutes.
pub const DEFAULT_BREAK_MINUTES: u32 = 5;

/// Shortest accepted interval, in minutes.
pub const MIN_MINUTES: u32 = 1;

/// Longest accepted interval, in minutes.
pub const MAX_MINUTES: u32 = 60;

// ============================================================================
// Duration Config
// ============================================================================

/// Work and break lengths, always within `[MIN_MINUTES, MAX_MINUTES]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationConfig {
    pub work_minutes: u32,
    pub break_minutes: u32,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
        }
    }
}

impl DurationConfig {
    /// Creates a config from already-numeric minutes, coercing out-of-range values.
    pub fn new(work_minutes: i64, break_minutes: i64) -> Self {
        Self {
            work_minutes: clamp_minutes(Some(work_minutes), DEFAULT_WORK_MINUTES),
            break_minutes: clamp_minutes(Some(break_minutes), DEFAULT_BREAK_MINUTES),
        }
    }

    /// Creates a config from raw stored or user-supplied values.
    ///
    /// Missing or non-numeric values fall back to the defaults (25 / 5).
    pub fn from_raw(work: Option<&Value>, brk: Option<&Value>) -> Self {
        Self {
            work_minutes: coerce_minutes(work, DEFAULT_WORK_MINUTES),
            break_minutes: coerce_minutes(brk, DEFAULT_BREAK_MINUTES),
        }
    }

    /// Length of the given phase, in seconds.
    pub fn seconds_for(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Work => self.work_minutes * 60,
            Phase::Break => self.break_minutes * 60,
        }
    }
}

/// Coerces an arbitrary JSON value to a minute count.
///
/// Numbers are truncated, strings contribute their leading integer
/// (`"25min"` is 25). Anything that yields no integer, or an integer below
/// `MIN_MINUTES`, becomes `default`; larger values are capped at `MAX_MINUTES`.
pub fn coerce_minutes(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_integer(s),
        _ => None,
    };
    clamp_minutes(parsed, default)
}

fn clamp_minutes(value: Option<i64>, default: u32) -> u32 {
    match value {
        Some(v) if v >= i64::from(MIN_MINUTES) => {
            u32::try_from(v.min(i64::from(MAX_MINUTES))).unwrap_or(default)
        }
        _ => default,
    }
}

/// Parses the leading (optionally signed) integer of a string.
fn leading_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    let number = digits.get(..end).filter(|d| !d.is_empty())?;

    // Saturate absurdly long inputs; they clamp to MAX_MINUTES anyway.
    let magnitude = number.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

// ============================================================================
// Timer Settings
// ============================================================================

/// All user-configurable behaviour of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    #[serde(flatten)]
    pub durations: DurationConfig,
    pub sound_enabled: bool,
    pub notification_enabled: bool,
    /// Whether the next phase starts automatically after a completion.
    pub auto_switch_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            durations: DurationConfig::default(),
            sound_enabled: true,
            notification_enabled: true,
            auto_switch_enabled: true,
        }
    }
}

/// A partial settings change requested by a client.
///
/// Absent fields keep their current value. Durations stay raw JSON so that
/// coercion happens in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_minutes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_switch_enabled: Option<bool>,
}

/// Which durations a settings update actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationChange {
    pub work_changed: bool,
    pub break_changed: bool,
}

impl DurationChange {
    /// True when the duration governing `phase` changed.
    pub fn affects(self, phase: Phase) -> bool {
        match phase {
            Phase::Work => self.work_changed,
            Phase::Break => self.break_changed,
        }
    }

    pub fn any(self) -> bool {
        self.work_changed || self.break_changed
    }
}

impl TimerSettings {
    /// Applies a partial update and reports which durations changed.
    pub fn apply(&mut self, update: &SettingsUpdate) -> DurationChange {
        let before = self.durations;

        if let Some(raw) = &update.work_minutes {
            self.durations.work_minutes = coerce_minutes(Some(raw), DEFAULT_WORK_MINUTES);
        }
        if let Some(raw) = &update.break_minutes {
            self.durations.break_minutes = coerce_minutes(Some(raw), DEFAULT_BREAK_MINUTES);
        }
        if let Some(enabled) = update.sound_enabled {
            self.sound_enabled = enabled;
        }
        if let Some(enabled) = update.notification_enabled {
            self.notification_enabled = enabled;
        }
        if let Some(enabled) = update.auto_switch_enabled {
            self.auto_switch_enabled = enabled;
        }

        DurationChange {
            work_changed: self.durations.work_minutes != before.work_minutes,
            break_changed: self.durations.break_minutes != before.break_minutes,
        }
    }
}
