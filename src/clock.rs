//! Injected clock.
//!
//! Every `calculatedAt`/`processedAt`/`supersededAt`/cache-refresh timestamp
//! flows through a `Clock` rather than calling `Utc::now()` directly, so
//! scenario tests can fix time and assert exact values.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that never advances unless told to.
pub struct FixedClock {
    current: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }

    /// Advance by a fixed step, useful for asserting strict monotonicity
    /// across successive calc versions without depending on wall time.
    pub fn advance(&self, duration: chrono::Duration) -> DateTime<Utc> {
        let mut guard = self.current.lock();
        *guard += duration;
        *guard
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_holds_until_advanced() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 20, 9, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);
        let t1 = clock.advance(chrono::Duration::seconds(1));
        assert_eq!(clock.now(), t1);
        assert!(t1 > t0);
    }
}
