//! Statistics over the completion ledger.
//!
//! `aggregate` is a pure function of the ledger and the current day. Each
//! granularity yields a fixed-length series, oldest bucket first, with one
//! label per bucket. Buckets of one granularity never overlap, so a record is
//! counted at most once per series.

use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::history::CompletionRecord;

/// Number of daily buckets (last 30 calendar days).
pub const DAILY_BUCKETS: usize = 30;

/// Number of weekly buckets (last 26 ISO weeks).
pub const WEEKLY_BUCKETS: usize = 26;

/// Number of monthly buckets (last 12 calendar months).
pub const MONTHLY_BUCKETS: usize = 12;

/// Counts aligned with their labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub data: Vec<u32>,
}

impl Series {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            labels: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, label: String, count: u32) {
        self.labels.push(label);
        self.data.push(count);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sum of all buckets.
    pub fn total(&self) -> u32 {
        self.data.iter().sum()
    }
}

/// Daily, weekly and monthly completion counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub daily: Series,
    pub weekly: Series,
    pub monthly: Series,
}

/// Buckets the ledger into daily, weekly and monthly series ending at `today`.
pub fn aggregate(history: &[CompletionRecord], today: NaiveDate) -> Statistics {
    Statistics {
        daily: daily_series(history, today),
        weekly: weekly_series(history, today),
        monthly: monthly_series(history, today),
    }
}

fn daily_series(history: &[CompletionRecord], today: NaiveDate) -> Series {
    let by_day = count_by(history, |date| date);
    let mut series = Series::with_capacity(DAILY_BUCKETS);

    for offset in (0..DAILY_BUCKETS as u64).rev() {
        let Some(date) = today.checked_sub_days(Days::new(offset)) else {
            series.push(String::new(), 0);
            continue;
        };
        let count = by_day.get(&date).copied().unwrap_or(0);
        series.push(date.format("%m-%d").to_string(), count);
    }

    series
}

fn weekly_series(history: &[CompletionRecord], today: NaiveDate) -> Series {
    let iso_key = |date: NaiveDate| {
        let week = date.iso_week();
        (week.year(), week.week())
    };
    let by_week = count_by(history, iso_key);
    let mut series = Series::with_capacity(WEEKLY_BUCKETS);

    for offset in (0..WEEKLY_BUCKETS as u64).rev() {
        let Some(date) = today.checked_sub_days(Days::new(offset * 7)) else {
            series.push(String::new(), 0);
            continue;
        };
        let key = iso_key(date);
        let count = by_week.get(&key).copied().unwrap_or(0);
        series.push(format!("W{}", key.1), count);
    }

    series
}

fn monthly_series(history: &[CompletionRecord], today: NaiveDate) -> Series {
    let by_month = count_by(history, |date| (date.year(), date.month()));
    let mut series = Series::with_capacity(MONTHLY_BUCKETS);

    // Months as a single running index so stepping back crosses years cleanly.
    let current = i64::from(today.year()) * 12 + i64::from(today.month0());

    for offset in (0..MONTHLY_BUCKETS as i64).rev() {
        let index = current - offset;
        let year = i32::try_from(index.div_euclid(12)).unwrap_or(today.year());
        let month = u32::try_from(index.rem_euclid(12) + 1).unwrap_or(1);

        let count = by_month.get(&(year, month)).copied().unwrap_or(0);
        series.push(format!("{month:02}"), count);
    }

    series
}

fn count_by<K, F>(history: &[CompletionRecord], key: F) -> HashMap<K, u32>
where
    K: std::hash::Hash + Eq,
    F: Fn(NaiveDate) -> K,
{
    let mut counts = HashMap::new();
    for record in history {
        *counts.entry(key(record.date)).or_insert(0) += 1;
    }
    counts
}
