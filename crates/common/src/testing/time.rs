//! Time abstraction for testability
//!
//! Key caches compare against the monotonic [`Clock::now`]; rotation
//! schedules compare against the wall clock [`Clock::utc_now`]. Both come
//! from the same trait so one [`MockClock`] can drive either.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Trait for time operations to enable testing
///
/// This trait provides an abstraction over time operations, allowing code
/// to work with either real system time or mocked time for testing.
pub trait Clock: Send + Sync {
    /// Get current instant (monotonic time)
    ///
    /// Returns a monotonic timestamp suitable for measuring durations.
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    ///
    /// Returns the current wall clock time.
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    ///
    /// Convenience method for getting the current time as milliseconds
    /// since the UNIX epoch (January 1, 1970).
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }

    /// Current wall clock time as a UTC timestamp
    fn utc_now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.system_time())
    }
}

/// Real system clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed counter, so a clock handed to a service can
/// still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a new mock clock
    ///
    /// The clock starts at the current real time but can be advanced
    /// manually without real time passing.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Create a mock clock whose wall clock starts at `start`
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::from(start),
        }
    }

    /// Advance the mock clock by a duration
    ///
    /// This simulates time passing without actually waiting.
    pub fn advance(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += duration;
    }

    /// Set the mock clock to a specific elapsed time
    ///
    /// This sets the clock to an absolute elapsed time, replacing
    /// any previous elapsed time.
    pub fn set_elapsed(&self, duration: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed = duration;
    }

    /// Get the current elapsed time
    ///
    /// Returns how much time has been simulated since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::time.
    use super::*;

    /// Validates the system clock scenario.
    ///
    /// Assertions:
    /// - Ensures `now2 >= now1` evaluates to true.
    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let now1 = clock.now();
        let now2 = clock.now();

        assert!(now2 >= now1);
    }

    /// Validates the system clock millis scenario.
    ///
    /// Assertions:
    /// - Ensures `millis > 0` evaluates to true.
    #[test]
    fn test_system_clock_millis() {
        let clock = SystemClock;
        let millis = clock.millis_since_epoch();
        assert!(millis > 0);
    }

    /// Validates `MockClock::new` behavior for the mock clock advance scenario.
    ///
    /// Assertions:
    /// - Confirms `after.duration_since(start)` equals
    ///   `Duration::from_secs(5)`.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));
        let after = clock.now();

        assert_eq!(after.duration_since(start), Duration::from_secs(5));
    }

    /// Validates `MockClock::new` behavior for the mock clock set elapsed
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `clock.elapsed()` equals `Duration::from_secs(10)`.
    /// - Confirms `clock.elapsed()` equals `Duration::from_secs(20)`.
    #[test]
    fn test_mock_clock_set_elapsed() {
        let clock = MockClock::new();

        clock.set_elapsed(Duration::from_secs(10));
        assert_eq!(clock.elapsed(), Duration::from_secs(10));

        clock.set_elapsed(Duration::from_secs(20));
        assert_eq!(clock.elapsed(), Duration::from_secs(20));
    }

    /// Validates `MockClock::new` behavior for the mock clock millis since
    /// epoch scenario.
    ///
    /// Assertions:
    /// - Confirms `millis.saturating_sub(before)` equals `5000`.
    #[test]
    fn test_mock_clock_millis_since_epoch() {
        let clock = MockClock::new();
        let before = clock.millis_since_epoch();
        clock.set_elapsed(Duration::from_millis(5000));

        let millis = clock.millis_since_epoch();
        assert_eq!(millis.saturating_sub(before), 5000);
    }

    /// Validates `MockClock::new` behavior for the mock clock clone scenario.
    ///
    /// Assertions:
    /// - Confirms `clock2.elapsed()` equals `Duration::from_secs(10)`.
    /// - Confirms `clock2.elapsed()` equals `Duration::from_secs(15)`.
    #[test]
    fn test_mock_clock_clone() {
        let clock1 = MockClock::new();
        clock1.advance(Duration::from_secs(10));

        let clock2 = clock1.clone();
        assert_eq!(clock2.elapsed(), Duration::from_secs(10));

        // Cloned clocks share the same elapsed time
        clock1.advance(Duration::from_secs(5));
        assert_eq!(clock2.elapsed(), Duration::from_secs(15));
    }

    /// Validates `MockClock::starting_at` behavior for the wall clock
    /// anchoring scenario.
    ///
    /// Assertions:
    /// - Confirms `utc_now` starts at the anchor and follows `advance`.
    #[test]
    fn test_mock_clock_starting_at() {
        let anchor =
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let clock = MockClock::starting_at(anchor);
        assert_eq!(clock.utc_now(), anchor);

        clock.advance(Duration::from_secs(86_400));
        assert_eq!(clock.utc_now(), anchor + chrono::Duration::days(1));
    }

    /// Validates `MockClock::new` behavior for the mock clock multiple advances
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `clock.elapsed()` equals `Duration::from_secs(6)`.
    #[test]
    fn test_mock_clock_multiple_advances() {
        let clock = MockClock::new();

        clock.advance(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        clock.advance(Duration::from_secs(3));

        assert_eq!(clock.elapsed(), Duration::from_secs(6));
    }
}
