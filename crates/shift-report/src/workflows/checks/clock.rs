use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// Source of localized wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Localizes the system clock into the business time zone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    zone: Tz,
}

impl ZonedClock {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }
}

impl Clock for ZonedClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.zone).naive_local()
    }
}

/// Manually driven clock for tests and the scripted demo.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn at(current: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(current),
        }
    }

    /// A single instant cannot be left half-written, so a poisoned lock
    /// still holds a usable value.
    fn current(&self) -> MutexGuard<'_, NaiveDateTime> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, value: NaiveDateTime) {
        *self.current() = value;
    }

    pub fn advance(&self, by: Duration) {
        *self.current() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.current()
    }
}
