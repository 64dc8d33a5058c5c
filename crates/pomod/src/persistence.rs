//! Typed load/save boundary over the key-value store.
//!
//! Every piece of timer state lives under a fixed store key. This module is
//! the only place that knows those keys and their encodings; the timer actor
//! works purely on `pomo_core` types.
//!
//! Decoding is strict for the timer snapshot (a snapshot that cannot be
//! decoded is reported as `PersistenceError::Corrupt`) and lenient for
//! everything else: bad settings coerce to defaults, malformed ledger entries
//! are skipped, and a bad counter is recomputed from the ledger anyway.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use pomo_core::{
    format_date, DailyCounter, DurationConfig, History, Phase, RunState, TimerSettings,
    TimerSnapshot,
};

use crate::store::{KeyValueStore, StoreError, StoreValues};

/// Store keys.
pub mod keys {
    pub const SECONDS_REMAINING: &str = "secondsRemaining";
    pub const RUN_STATE: &str = "runState";
    pub const PHASE: &str = "phase";
    pub const LAST_PERSISTED_AT: &str = "lastPersistedAt";

    pub const WORK_MINUTES: &str = "workMinutes";
    pub const BREAK_MINUTES: &str = "breakMinutes";
    pub const SOUND_ENABLED: &str = "soundEnabled";
    pub const NOTIFICATION_ENABLED: &str = "notificationEnabled";
    pub const AUTO_SWITCH_ENABLED: &str = "autoSwitchEnabled";

    pub const COMPLETION_HISTORY: &str = "completionHistory";
    pub const DAILY_COMPLETED_COUNT: &str = "dailyCompletedCount";
    pub const LAST_RESET_DATE: &str = "lastResetDate";
}

const SNAPSHOT_KEYS: [&str; 4] = [
    keys::SECONDS_REMAINING,
    keys::RUN_STATE,
    keys::PHASE,
    keys::LAST_PERSISTED_AT,
];

const SETTINGS_KEYS: [&str; 5] = [
    keys::WORK_MINUTES,
    keys::BREAK_MINUTES,
    keys::SOUND_ENABLED,
    keys::NOTIFICATION_ENABLED,
    keys::AUTO_SWITCH_ENABLED,
];

const COUNTER_KEYS: [&str; 2] = [keys::DAILY_COMPLETED_COUNT, keys::LAST_RESET_DATE];

/// Errors crossing the persistence boundary.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("stored {key} is invalid: {reason}")]
    Corrupt { key: &'static str, reason: String },
}

/// Typed access to the persisted timer state.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Timer Snapshot
    // ========================================================================

    /// Loads the persisted snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    pub async fn load_snapshot(&self) -> Result<Option<TimerSnapshot>, PersistenceError> {
        let values = self.store.get(&SNAPSHOT_KEYS).await?;

        let any_present = [keys::SECONDS_REMAINING, keys::RUN_STATE, keys::PHASE]
            .iter()
            .any(|key| values.contains_key(*key));
        if !any_present {
            return Ok(None);
        }

        let seconds_remaining: u32 = decode(&values, keys::SECONDS_REMAINING)?;
        let run_state: RunState = decode(&values, keys::RUN_STATE)?;
        let phase: Phase = decode(&values, keys::PHASE)?;

        let last_persisted_at = values
            .get(keys::LAST_PERSISTED_AT)
            .and_then(|v| match serde_json::from_value::<DateTime<Utc>>(v.clone()) {
                Ok(at) => Some(at),
                Err(e) => {
                    debug!(error = %e, "Ignoring unreadable lastPersistedAt");
                    None
                }
            });

        Ok(Some(TimerSnapshot {
            phase,
            run_state,
            seconds_remaining,
            last_persisted_at,
        }))
    }

    pub async fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<(), PersistenceError> {
        let mut entries = Map::new();
        entries.insert(keys::SECONDS_REMAINING.into(), json!(snapshot.seconds_remaining));
        entries.insert(keys::RUN_STATE.into(), json!(snapshot.run_state));
        entries.insert(keys::PHASE.into(), json!(snapshot.phase));
        if let Some(at) = snapshot.last_persisted_at {
            entries.insert(keys::LAST_PERSISTED_AT.into(), json!(at));
        }

        self.store.set_many(entries).await?;
        Ok(())
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Loads settings, coercing anything unusable to its default.
    pub async fn load_settings(&self) -> Result<TimerSettings, PersistenceError> {
        let values = self.store.get(&SETTINGS_KEYS).await?;
        let defaults = TimerSettings::default();

        let flag = |key: &str, default: bool| {
            values.get(key).and_then(Value::as_bool).unwrap_or(default)
        };

        Ok(TimerSettings {
            durations: DurationConfig::from_raw(
                values.get(keys::WORK_MINUTES),
                values.get(keys::BREAK_MINUTES),
            ),
            sound_enabled: flag(keys::SOUND_ENABLED, defaults.sound_enabled),
            notification_enabled: flag(keys::NOTIFICATION_ENABLED, defaults.notification_enabled),
            auto_switch_enabled: flag(keys::AUTO_SWITCH_ENABLED, defaults.auto_switch_enabled),
        })
    }

    pub async fn save_settings(&self, settings: &TimerSettings) -> Result<(), PersistenceError> {
        let mut entries = Map::new();
        entries.insert(keys::WORK_MINUTES.into(), json!(settings.durations.work_minutes));
        entries.insert(keys::BREAK_MINUTES.into(), json!(settings.durations.break_minutes));
        entries.insert(keys::SOUND_ENABLED.into(), json!(settings.sound_enabled));
        entries.insert(
            keys::NOTIFICATION_ENABLED.into(),
            json!(settings.notification_enabled),
        );
        entries.insert(
            keys::AUTO_SWITCH_ENABLED.into(),
            json!(settings.auto_switch_enabled),
        );

        self.store.set_many(entries).await?;
        Ok(())
    }

    // ========================================================================
    // History & Daily Counter
    // ========================================================================

    /// Loads the completion ledger. A missing ledger is an empty one.
    pub async fn load_history(&self) -> Result<History, PersistenceError> {
        let values = self.store.get(&[keys::COMPLETION_HISTORY]).await?;

        let history = match values.get(keys::COMPLETION_HISTORY) {
            None | Some(Value::Null) => History::new(),
            Some(Value::Array(entries)) => {
                let (history, skipped) = History::from_values(entries);
                if skipped > 0 {
                    warn!(skipped, kept = history.len(), "Completion history had malformed entries");
                }
                history
            }
            Some(other) => {
                warn!(value = %other, "Completion history is not a list, treating as empty");
                History::new()
            }
        };

        Ok(history)
    }

    pub async fn save_history(&self, history: &History) -> Result<(), PersistenceError> {
        let mut entries = Map::new();
        let encoded = serde_json::to_value(history).map_err(StoreError::from)?;
        entries.insert(keys::COMPLETION_HISTORY.into(), encoded);

        self.store.set_many(entries).await?;
        Ok(())
    }

    /// Loads the cached daily counter. Unreadable fields fall back to zero
    /// and "never reset", which forces a recompute on the next check.
    pub async fn load_counter(&self) -> Result<DailyCounter, PersistenceError> {
        let values = self.store.get(&COUNTER_KEYS).await?;

        let completed_pomodoros = values
            .get(keys::DAILY_COMPLETED_COUNT)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);

        let last_reset_date = values
            .get(keys::LAST_RESET_DATE)
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        Ok(DailyCounter {
            completed_pomodoros,
            last_reset_date,
        })
    }

    pub async fn save_counter(&self, counter: &DailyCounter) -> Result<(), PersistenceError> {
        let mut entries = Map::new();
        entries.insert(
            keys::DAILY_COMPLETED_COUNT.into(),
            json!(counter.completed_pomodoros),
        );
        if let Some(date) = counter.last_reset_date {
            entries.insert(keys::LAST_RESET_DATE.into(), json!(format_date(date)));
        }

        self.store.set_many(entries).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(values: &StoreValues, key: &'static str) -> Result<T, PersistenceError> {
    let value = values.get(key).ok_or(PersistenceError::Corrupt {
        key,
        reason: "missing".to_string(),
    })?;

    serde_json::from_value(value.clone()).map_err(|e| PersistenceError::Corrupt {
        key,
        reason: e.to_string(),
    })
}
