use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Time source used for cache and collection staleness.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Rc<dyn Clock>;

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl ManualClock {
    pub fn with_time(time: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(time),
        }
    }

    pub fn new() -> Self {
        Self::with_time(Utc::now())
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        self.now.set(time);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}
