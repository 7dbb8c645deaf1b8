//! Injectable clock.
//!
//! The activation kernel and recall pipeline need "now" but must not call
//! `Utc::now()` directly, or tests could never advance time deterministically
//! to exercise decay and consolidation. Every component that needs the
//! current instant takes a `&dyn Clock` instead.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// forward when told to.
#[derive(Debug)]
pub struct FixedClock {
    micros: AtomicI64,
}

impl FixedClock {
    /// Creates a clock starting at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    /// Advances the clock by `duration` and returns the new instant.
    pub fn advance(&self, duration: chrono::Duration) -> DateTime<Utc> {
        let micros = self
            .micros
            .fetch_add(duration.num_microseconds().unwrap_or(0), Ordering::SeqCst)
            + duration.num_microseconds().unwrap_or(0);
        DateTime::from_timestamp_micros(micros).expect("valid timestamp")
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).expect("valid timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc::now();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::hours(10));
        assert_eq!(clock.now(), start + chrono::Duration::hours(10));
    }
}
