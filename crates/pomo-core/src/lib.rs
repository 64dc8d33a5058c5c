//! pomo Core - Domain types for the single-timer Pomodoro daemon
//!
//! This crate provides the pure domain model shared between the daemon
//! (pomod) and its clients:
//! - `timer` - the `TimerSnapshot` state machine (phase x run-state)
//! - `settings` - duration and feature flags, with lenient input coercion
//! - `history` - the append-only completion ledger and the daily counter
//! - `stats` - daily/weekly/monthly aggregation over the ledger
//! - `badge` - passive indicator text derived from a snapshot
//! - `view` - the read-only `TimerView` sent to clients
//! - `clock` - local wall-clock abstraction
//!
//! Nothing here performs I/O. All code follows the panic-free policy: no
//! `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`, or
//! direct indexing `[i]`.

pub mod badge;
pub mod clock;
pub mod error;
pub mod history;
pub mod settings;
pub mod stats;
pub mod timer;
pub mod view;

// Re-exports for convenience
pub use badge::{Badge, BadgeColor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use history::{format_date, CompletionRecord, DailyCounter, DailyCheck, History};
pub use settings::{
    coerce_minutes, DurationChange, DurationConfig, SettingsUpdate, TimerSettings,
    DEFAULT_BREAK_MINUTES, DEFAULT_WORK_MINUTES, MAX_MINUTES, MIN_MINUTES,
};
pub use stats::{aggregate, Series, Statistics, DAILY_BUCKETS, MONTHLY_BUCKETS, WEEKLY_BUCKETS};
pub use timer::{Phase, PhaseCompletion, RunState, StartOutcome, TickOutcome, TimerSnapshot};
pub use view::TimerView;
