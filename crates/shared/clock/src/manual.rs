use chrono::{Duration, Utc};
use std::sync::{Arc, RwLock};
use tradedesk_core::Timestamp;
use tradedesk_ports::Clock;

/// Clock that only moves when told to
///
/// Deterministic time for tests and replays: `now()` returns the same value
/// until `advance` or `set` is called.
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a manual clock
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(initial_time.unwrap_or_else(Utc::now)),
        })
    }

    /// Advance the clock by a specified duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Explicitly set the time
    ///
    /// Warning: moving backwards makes elapsed-time readings negative.
    pub fn set(&self, time: Timestamp) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_is_frozen_until_advanced() {
        let clock = ManualClock::new(None);

        let time1 = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.now(), time1);

        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now() - time1, Duration::seconds(5));
    }

    #[test]
    fn test_set() {
        let start = Utc::now();
        let clock = ManualClock::new(Some(start));

        let later = start + Duration::minutes(3);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
