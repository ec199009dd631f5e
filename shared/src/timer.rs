use std::time::{Duration, Instant};

/// Interval timer driven by the tick loop: `ringing()` reports whether the
/// interval has elapsed since the last `reset()`.
pub struct Timer {
    interval: Duration,
    last: Instant,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Restart the interval from now
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Returns whether the interval has fully elapsed
    pub fn ringing(&self) -> bool {
        self.last.elapsed() >= self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.last.elapsed()
    }
}
