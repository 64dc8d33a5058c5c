//! Completion ledger and the derived daily counter.
//!
//! The ledger is append-only: one `CompletionRecord` per finished work
//! interval, in chronological order, never edited or pruned. Every count shown
//! to the user is re-derived from it rather than incremented, so a missed
//! update (crash mid-tick) heals itself at the next check.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{DomainError, DomainResult};

/// Storage format for calendar days.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a day as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ============================================================================
// Completion Record
// ============================================================================

/// One finished work interval, dated by local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub date: NaiveDate,
}

impl CompletionRecord {
    pub fn on(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Parses a stored `{"date": "YYYY-MM-DD"}` entry.
    pub fn from_value(value: &Value) -> DomainResult<Self> {
        let raw = value
            .get("date")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::parse("date", "missing date string"))?;

        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Self::on)
            .map_err(|_| DomainError::InvalidFieldValue {
                field: "date".to_string(),
                value: raw.to_string(),
                expected: "YYYY-MM-DD".to_string(),
            })
    }
}

// ============================================================================
// History Ledger
// ============================================================================

/// Ordered, append-only list of completion records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<CompletionRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CompletionRecord>) -> Self {
        Self { records }
    }

    /// Builds a ledger from raw stored entries, skipping malformed ones.
    ///
    /// Returns the ledger and the number of entries skipped.
    pub fn from_values(values: &[Value]) -> (Self, usize) {
        let mut records = Vec::with_capacity(values.len());
        let mut skipped = 0;

        for value in values {
            match CompletionRecord::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(error = %e, entry = %value, "Skipping malformed completion record");
                    skipped += 1;
                }
            }
        }

        (Self { records }, skipped)
    }

    pub fn records(&self) -> &[CompletionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a completion for `date`.
    pub fn append(&mut self, date: NaiveDate) -> CompletionRecord {
        let record = CompletionRecord::on(date);
        self.records.push(record);
        record
    }

    /// Number of completions recorded on `date`.
    pub fn count_on(&self, date: NaiveDate) -> u32 {
        let count = self.records.iter().filter(|r| r.date == date).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

// ============================================================================
// Daily Counter
// ============================================================================

/// Cached count of today's completions plus the day it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCounter {
    pub completed_pomodoros: u32,
    #[serde(default)]
    pub last_reset_date: Option<NaiveDate>,
}

/// Outcome of a daily counter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCheck {
    /// Today's completion count after the check.
    pub count: u32,
    /// True when the stored day was not today (counter rolled over).
    pub new_day: bool,
    /// True when either the count or the day changed.
    pub changed: bool,
}

impl DailyCounter {
    /// Re-derives the counter for `today` from the ledger.
    ///
    /// On a new day the counter is rolled over to `today`; the ledger itself is
    /// never touched. The count is always recomputed, never incremented.
    pub fn check_and_reset(&mut self, history: &History, today: NaiveDate) -> DailyCheck {
        let previous = *self;
        let new_day = self.last_reset_date != Some(today);

        self.last_reset_date = Some(today);
        self.completed_pomodoros = history.count_on(today);

        DailyCheck {
            count: self.completed_pomodoros,
            new_day,
            changed: *self != previous,
        }
    }
}
