use chrono::{NaiveDateTime, Utc};

/// Source of flush timestamps, always UTC.
pub trait FlushClock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl FlushClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Always returns the same instant. Used to pin object keys in tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub NaiveDateTime);

impl FlushClock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
