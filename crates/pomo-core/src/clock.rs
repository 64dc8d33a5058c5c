//! Wall-clock abstraction.
//!
//! Calendar days are always local-time days. The daemon uses `SystemClock`;
//! tests pin the date with `FixedClock`.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant, in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Current local calendar day.
    fn today(&self) -> NaiveDate;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to a settable instant.
///
/// Cloning shares the underlying instant, so a test can keep one clone and
/// move the time of the clone it handed to the daemon.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// A clock at local noon of `date`.
    pub fn at_local_date(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        Self::new(noon)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Moves the clock to local noon of `date`.
    pub fn set_local_date(&self, date: NaiveDate) {
        self.set(Self::at_local_date(date).now());
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}
