use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::messages::{
    envelope::{CorrelationId, Envelope},
    message_kinds::MessageKind,
};

/// Window over which the call-rate guard counts blocking calls
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Bookkeeping for the one in-flight blocking call
#[derive(Debug)]
pub struct PendingCall {
    pub correlation: CorrelationId,
    pub issued_at: Instant,
    pub expected: MessageKind,
}

/// Pairs blocking-call requests with their responses by correlation id.
///
/// The broker only tracks state; the wait loop itself lives with the owner
/// of the inbound queue. At most one call is pending at a time because a
/// blocking call stalls its calling thread by design.
pub struct CallBroker {
    next_correlation: u64,
    pending: Option<PendingCall>,
    recent_calls: VecDeque<Instant>,
    rate_warning: u32,
}

impl CallBroker {
    pub fn new(rate_warning: u32) -> Self {
        Self {
            // correlation ids start above zero so a zeroed envelope on the
            // wire can never match a real call
            next_correlation: 1,
            pending: None,
            recent_calls: VecDeque::new(),
            rate_warning,
        }
    }

    /// Fresh correlation id for an outgoing request
    pub fn next_correlation(&mut self) -> CorrelationId {
        let id = CorrelationId::new(self.next_correlation);
        self.next_correlation = self.next_correlation.wrapping_add(1).max(1);
        id
    }

    /// Start tracking one call, feeding the rate guard.
    ///
    /// Each blocking call stalls its caller for a round trip, so a caller
    /// issuing them faster than the configured rate gets a loud warning.
    pub fn begin_call(&mut self, name: &'static str, correlation: CorrelationId, expected: MessageKind) {
        let now = Instant::now();
        self.recent_calls.push_back(now);
        while let Some(front) = self.recent_calls.front() {
            if now.duration_since(*front) > RATE_WINDOW {
                self.recent_calls.pop_front();
            } else {
                break;
            }
        }
        if self.recent_calls.len() as u32 > self.rate_warning {
            warn!(
                "{} blocking calls in the last second (issuing {}); each one stalls its caller",
                self.recent_calls.len(),
                name
            );
        }

        self.pending = Some(PendingCall {
            correlation,
            issued_at: now,
            expected,
        });
    }

    /// Whether this envelope is the response the pending call is waiting for
    pub fn matches(&self, envelope: &Envelope) -> bool {
        match (&self.pending, envelope.correlation) {
            (Some(pending), Some(correlation)) => {
                pending.correlation == correlation && pending.expected == envelope.kind
            }
            _ => false,
        }
    }

    /// Clear bookkeeping on every call exit path — success, timeout, or
    /// disconnect. After this, a late response matches nothing and is
    /// ignored where it is observed.
    pub fn clear_pending(&mut self) -> Option<PendingCall> {
        self.pending.take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Log-and-drop for a correlated envelope that matches no pending call:
    /// the reply to a call that already timed out. Must never be applied.
    pub fn note_orphan_response(&self, envelope: &Envelope) {
        if let Some(correlation) = envelope.correlation {
            debug!(
                "Ignoring response with correlation {} matching no pending call",
                correlation.value()
            );
        }
    }
}
