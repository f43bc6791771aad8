//! Time sources.

use crate::types::Timestamp;
use parking_lot::Mutex;
use std::fmt;
use std::time::SystemTime;

/// Source of timestamps for version entries and transaction operations.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }
}

/// A clock that only moves when told to.
///
/// ```rust
/// use docket_core::{Clock, ManualClock, Timestamp};
///
/// let clock = ManualClock::new(Timestamp::from_secs(10.0));
/// clock.advance(2.5);
/// assert_eq!(clock.now(), Timestamp::from_secs(12.5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock to `to`.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock() = to;
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let mut now = self.now.lock();
        *now = now.offset(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
