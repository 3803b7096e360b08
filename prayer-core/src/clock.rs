use chrono::{DateTime, Local};
use std::{fmt::Debug, sync::Mutex};

/// Source of the current local time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Local>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Local.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).earliest().unwrap();
        let clock = ManualClock::new(start);

        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(clock.now() - start, chrono::Duration::minutes(90));
        assert_eq!(clock.now_ms() - start.timestamp_millis(), 90 * 60 * 1000);
    }
}
