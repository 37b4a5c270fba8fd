//! Time management utilities

use std::time::{Duration, Instant};

/// Wall-clock interval gate
///
/// Reports `true` from [`IntervalTimer::tick`] at most once per interval,
/// measured from construction or the previous firing.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    last_fired: Instant,
}

impl IntervalTimer {
    /// Create a timer that first fires one interval from now
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: Instant::now(),
        }
    }

    /// Returns `true` and restarts the interval if it has elapsed
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// Same as [`IntervalTimer::tick`] with an explicit clock reading
    pub fn tick_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_fired) >= self.interval {
            self.last_fired = now;
            true
        } else {
            false
        }
    }

    /// Restart the interval from now
    pub fn reset(&mut self) {
        self.last_fired = Instant::now();
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
