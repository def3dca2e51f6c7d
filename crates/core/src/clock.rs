//! Time source seam.
//!
//! Services stamp `created`/`modified` through a `Clock` instead of calling
//! `Utc::now()` directly, so timestamp behaviour can be driven in tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C> Clock for Arc<C>
where
    C: Clock + ?Sized,
{
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests/dev.
///
/// Every call to `now()` returns the current instant and then advances it by
/// `step`, so consecutive readings are strictly increasing when `step > 0`.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            current: Mutex::new(start),
            step,
        }
    }

    /// Jump the clock forward without taking a reading.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        let reading = *current;
        *current += self.step;
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_strictly_increasing() {
        let clock = ManualClock::new(DateTime::<Utc>::UNIX_EPOCH, Duration::seconds(1));
        let a = clock.now();
        let b = clock.now();
        clock.advance(Duration::minutes(5));
        let c = clock.now();

        assert!(a < b);
        assert_eq!(c - b, Duration::seconds(1) + Duration::minutes(5));
    }
}
