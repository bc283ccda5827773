//! # Time source.
//!
//! Every timestamp the bus writes (`bus_published_at`, `bus_driven_at`, heartbeat
//! minutes, lock deadlines) comes from a [`Clock`]. Production uses [`SystemClock`];
//! [`ManualClock`] freezes and steps time for tests and simulations.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time in whole epoch seconds.
pub trait Clock: Send + Sync + 'static {
    /// Current time, seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// Shared handle to a clock.
pub type ClockRef = Arc<dyn Clock>;

/// System wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `now` epoch seconds.
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Creates the clock and returns it as a shared handle.
    pub fn arc(now: i64) -> Arc<Self> {
        Arc::new(Self::new(now))
    }

    /// Jumps to `now` epoch seconds.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(60);
        assert_eq!(clock.now(), 1_060);
        clock.set(5);
        assert_eq!(clock.now(), 5);
    }
}
