//! Time sources.
//!
//! RULE: Nothing in the core reads the system time directly.
//! Components that need "now" take a `Clock`, so tests can drive
//! time by hand with `ManualClock`.

use crate::types::Timestamp;
use chrono::{Duration, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { current: Mutex::new(start) }
    }

    /// Move time forward by `ms` milliseconds. Returns the new time.
    pub fn advance_ms(&self, ms: i64) -> Timestamp {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += Duration::milliseconds(ms);
        *current
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
