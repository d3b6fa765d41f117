//! Injectable wall clock.
//!
//! Every unlock decision is made against a `Clock` so tests can pin time to
//! exact instants. Production uses the local system clock, which the user
//! controls; see DESIGN.md for the open question on trusted time.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};

/// Source of the current instant
pub trait Clock {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the operating system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    /// Pin the clock at `now`
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self { now: Cell::new(now) }
    }

    /// Jump to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    /// Move forward (or backward, for a negative duration)
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
