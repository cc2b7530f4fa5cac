//! Timestamp source
//!
//! Reconciliation and queue writes stamp rows with the current time; routing
//! that through a trait lets tests pin the clock instead of sleeping.

use chrono::{DateTime, Utc};

use crate::utils::to_iso_millis;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time as the ISO-8601 string format persisted everywhere.
    fn now_iso(&self) -> String {
        to_iso_millis(self.now_utc())
    }
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}
