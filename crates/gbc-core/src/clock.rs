//! Day-boundary detection for the daily limiter.

use std::sync::Mutex;

use chrono::{Local, NaiveDate};

/// Tells callers whether a new calendar day started since the last query.
pub trait Clock: Send + Sync {
    fn day_switched(&self) -> bool;
}

/// Local-time clock.
///
/// Every query records the current day. The first query never reports a
/// switch. The lock only guards against accidental concurrent callers; the
/// limiter owning the clock is its single writer.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_day: Mutex<Option<NaiveDate>>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `today` and report whether it lies after the previously observed day.
    pub fn observe(&self, today: NaiveDate) -> bool {
        let mut last = match self.last_day.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let switched = matches!(*last, Some(prev) if today > prev);
        *last = Some(today);
        switched
    }
}

impl Clock for SystemClock {
    fn day_switched(&self) -> bool {
        self.observe(Local::now().date_naive())
    }
}
