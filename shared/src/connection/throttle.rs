use std::time::{Duration, Instant};

/// Two-gate admission control for best-effort traffic on one stream.
///
/// A send passes only when (a) at least `1/max_rate` has elapsed since this
/// stream's last transmitted send and (b) the outbound queue is not backing
/// up. Rejected sends are dropped, never buffered, so a stalled link bounds
/// latency instead of growing a backlog of stale sensor data. Critical
/// traffic does not consult the throttle at all.
pub struct Throttle {
    min_interval: Duration,
    max_queue_depth: usize,
    last_send: Option<Instant>,
}

impl Throttle {
    pub fn new(max_rate: f32, max_queue_depth: usize) -> Self {
        let min_interval = if max_rate > 0.0 {
            Duration::from_secs_f64(1.0 / f64::from(max_rate))
        } else {
            // a zero rate never passes; gate on an unreachable interval
            Duration::from_secs(u64::MAX / 4)
        };
        Self {
            min_interval,
            max_queue_depth,
            last_send: None,
        }
    }

    /// Whether a best-effort send may go out right now
    pub fn allows(&self, now: Instant, outbound_depth: usize) -> bool {
        if outbound_depth >= self.max_queue_depth {
            return false;
        }
        match self.last_send {
            Some(last) => now.duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Record a transmitted send; starts the next interval
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_send = Some(now);
    }

    /// Forget the last-send mark (used when a session resets)
    pub fn reset(&mut self) {
        self.last_send = None;
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
