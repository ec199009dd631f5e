use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    thread,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::{
    connection::{
        call_broker::CallBroker,
        channel::{Channel, ChannelEvent},
        config::ConnectionConfig,
        error::{CallError, DisconnectReason, SessionError},
        throttle::Throttle,
    },
    messages::{
        envelope::Envelope,
        error::WireError,
        handler_registry::{Dispatch, HandlerRegistry, ResponseKey},
        message::{Message, Request},
        message_kinds::{MessageKind, MessageKinds},
    },
    session::{Handshake, HandshakeAck, Heartbeat, SessionCommand, StreamControl, StreamId},
    timer::Timer,
};

/// Sleep granularity of the blocking-call wait loop
const CALL_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Built-in control traffic, decoded before adapter dispatch
#[derive(Debug)]
pub enum ControlMessage {
    Session(SessionCommand),
    Stream(StreamControl),
    Handshake(Handshake),
    HandshakeAck(HandshakeAck),
}

/// What one `poll` pass surfaces to the role layer, in arrival order
#[derive(Debug)]
pub enum PollEvent {
    Connected(SocketAddr),
    Disconnected(DisconnectReason),
    Control(ControlMessage),
    /// A fault that cost us the session (the link is already dropping)
    Fault(SessionError),
}

/// Kinds of the built-in control messages, resolved once at construction so
/// the poll loop never does type lookups
struct ControlKinds {
    heartbeat: MessageKind,
    handshake: MessageKind,
    handshake_ack: MessageKind,
    session: MessageKind,
    stream: MessageKind,
}

impl ControlKinds {
    fn resolve(kinds: &MessageKinds) -> Self {
        let missing = "protocol is missing built-in control messages";
        Self {
            heartbeat: kinds.kind_of::<Heartbeat>().expect(missing),
            handshake: kinds.kind_of::<Handshake>().expect(missing),
            handshake_ack: kinds.kind_of::<HandshakeAck>().expect(missing),
            session: kinds.kind_of::<SessionCommand>().expect(missing),
            stream: kinds.kind_of::<StreamControl>().expect(missing),
        }
    }
}

/// Represents a connection to the remote peer, and provides the
/// role-neutral machinery both Host and Device wrap: enqueue-now sends,
/// per-stream throttles, the blocking-call wait, heartbeats, and the
/// poll loop that turns channel traffic into ordered events.
pub struct BaseConnection {
    channel: Channel,
    broker: CallBroker,
    throttles: HashMap<StreamId, Throttle>,
    /// Traffic observed by a blocking call that belongs to the next tick
    stash: VecDeque<ChannelEvent>,
    heartbeat_timer: Timer,
    timeout_timer: Timer,
    control: ControlKinds,
    /// Reason to report instead of `LocalShutdown` when we kicked the peer
    local_drop_reason: Option<DisconnectReason>,
    config: ConnectionConfig,
}

impl BaseConnection {
    pub fn new(channel: Channel, kinds: &MessageKinds, config: &ConnectionConfig) -> Self {
        Self {
            channel,
            broker: CallBroker::new(config.call_rate_warning),
            throttles: HashMap::new(),
            stash: VecDeque::new(),
            heartbeat_timer: Timer::new(config.heartbeat_interval),
            timeout_timer: Timer::new(config.connection_timeout),
            control: ControlKinds::resolve(kinds),
            local_drop_reason: None,
            config: config.clone(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.channel.local_addr()
    }

    pub fn has_pending_call(&self) -> bool {
        self.broker.has_pending()
    }

    // Outgoing traffic

    /// Queue a critical message: state transitions, control, anything whose
    /// loss the protocol cannot absorb. Bypasses the throttle. Never errors
    /// while disconnected — the envelope is silently dropped instead.
    pub fn try_send<M: Message>(
        &mut self,
        kinds: &MessageKinds,
        message: &M,
    ) -> Result<(), WireError> {
        let envelope = Envelope::seal(kinds, message)?;
        self.channel.send(envelope);
        self.mark_sent();
        Ok(())
    }

    /// Queue a critical message, logging instead of failing on a message
    /// type that cannot be sealed
    pub fn send<M: Message>(&mut self, kinds: &MessageKinds, message: &M) {
        if let Err(error) = self.try_send(kinds, message) {
            warn!("Dropping outbound {}: {}", M::name(), error);
        }
    }

    /// Queue a best-effort message on `stream`, subject to the stream's rate
    /// gate and the outbound depth gate. Returns whether it was transmitted;
    /// a gated send is dropped, never buffered.
    pub fn send_best_effort<M: Message>(
        &mut self,
        kinds: &MessageKinds,
        stream: StreamId,
        message: &M,
    ) -> bool {
        let now = Instant::now();
        let depth = self.channel.outbound_len();
        if !self.throttle_entry(stream).allows(now, depth) {
            trace!("Throttled best-effort {} on stream {:?}", M::name(), stream);
            return false;
        }
        let envelope = match Envelope::seal(kinds, message) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!("Dropping best-effort {}: {}", M::name(), error);
                return false;
            }
        };
        self.throttle_entry(stream).mark_sent(now);
        self.channel.send(envelope);
        self.mark_sent();
        true
    }

    /// Install or replace the rate limit for one stream
    pub fn set_stream_rate(&mut self, stream: StreamId, max_rate: f32) {
        self.throttles.insert(
            stream,
            Throttle::new(max_rate, self.config.throttle_queue_depth),
        );
    }

    /// Answer an inbound request, echoing its correlation id verbatim
    pub fn respond<Q: Request>(
        &mut self,
        kinds: &MessageKinds,
        key: ResponseKey,
        response: &Q::Response,
    ) {
        match Envelope::seal_correlated(kinds, response, key.correlation()) {
            Ok(envelope) => {
                self.channel.send(envelope);
                self.mark_sent();
            }
            Err(error) => {
                warn!(
                    "Dropping response {}: {}",
                    <Q::Response as Message>::name(),
                    error
                );
            }
        }
    }

    /// Send `request` and block the calling thread until the matching
    /// response arrives, the link drops, or the hard timeout elapses.
    ///
    /// Traffic observed while waiting is stashed and replayed on the next
    /// `poll`, so nothing is lost to the wait. Fails loudly on timeout and
    /// disconnect — a silent default would corrupt the caller's assumptions.
    pub fn blocking_call<Q: Request>(
        &mut self,
        kinds: &MessageKinds,
        request: Q,
    ) -> Result<Q::Response, CallError> {
        if !self.channel.is_connected() {
            return Err(CallError::NotConnected { name: Q::name() });
        }
        let expected = kinds.kind_of::<Q::Response>().map_err(|_| {
            CallError::Unregistered(WireError::Unregistered {
                name: <Q::Response as Message>::name(),
            })
        })?;
        let correlation = self.broker.next_correlation();
        let envelope = Envelope::seal_correlated(kinds, &request, correlation)
            .map_err(CallError::Unregistered)?;

        self.broker.begin_call(Q::name(), correlation, expected);
        self.channel.send(envelope);
        self.mark_sent();

        let deadline = Instant::now() + self.config.blocking_call_timeout;
        loop {
            while let Some(event) = self.channel.try_recv() {
                match event {
                    ChannelEvent::Envelope(inbound) => {
                        self.timeout_timer.reset();
                        if self.broker.matches(&inbound) {
                            self.broker.clear_pending();
                            return inbound.open::<Q::Response>().map_err(|source| {
                                CallError::MalformedResponse {
                                    name: Q::name(),
                                    source,
                                }
                            });
                        }
                        self.stash.push_back(ChannelEvent::Envelope(inbound));
                    }
                    ChannelEvent::Disconnected(reason) => {
                        self.broker.clear_pending();
                        self.stash.push_back(ChannelEvent::Disconnected(reason));
                        return Err(CallError::Disconnected {
                            name: Q::name(),
                            reason,
                        });
                    }
                    other => self.stash.push_back(other),
                }
            }
            if Instant::now() >= deadline {
                self.broker.clear_pending();
                return Err(CallError::Timeout {
                    name: Q::name(),
                    elapsed_millis: self.config.blocking_call_timeout.as_millis(),
                });
            }
            // the tick loop is stalled in here, so keep the link warm
            if self.heartbeat_timer.ringing() {
                self.send(kinds, &Heartbeat);
            }
            thread::sleep(CALL_POLL_INTERVAL);
        }
    }

    // Incoming traffic

    /// Drain everything the link produced since the last tick: run the
    /// heartbeat/timeout timers, decode control traffic, dispatch adapter
    /// messages to their registered handlers, and return session-level
    /// events in arrival order.
    pub fn poll(&mut self, kinds: &MessageKinds, handlers: &mut HandlerRegistry) -> Vec<PollEvent> {
        let mut events = Vec::new();

        if self.channel.is_connected() {
            if self.timeout_timer.ringing() {
                warn!(
                    "Nothing heard from peer for {:?}; dropping connection",
                    self.config.connection_timeout
                );
                self.drop_peer(DisconnectReason::TimedOut);
            } else if self.heartbeat_timer.ringing() {
                self.send(kinds, &Heartbeat);
            }
        }

        while let Some(event) = self.next_event() {
            match event {
                ChannelEvent::Connected(address) => {
                    self.on_connected();
                    events.push(PollEvent::Connected(address));
                }
                ChannelEvent::Disconnected(reason) => {
                    let reason = match (reason, self.local_drop_reason.take()) {
                        (DisconnectReason::LocalShutdown, Some(stored)) => stored,
                        (reason, _) => reason,
                    };
                    self.on_disconnected();
                    events.push(PollEvent::Disconnected(reason));
                }
                ChannelEvent::Envelope(envelope) => {
                    self.timeout_timer.reset();
                    self.handle_envelope(envelope, kinds, handlers, &mut events);
                }
            }
        }

        events
    }

    /// Drop the current peer, recording the reason the coming
    /// `Disconnected` event should carry
    pub fn drop_peer(&mut self, reason: DisconnectReason) {
        if self.channel.is_connected() {
            self.local_drop_reason = Some(reason);
            self.channel.drop_peer();
        }
    }

    // Internal

    fn next_event(&mut self) -> Option<ChannelEvent> {
        self.stash.pop_front().or_else(|| self.channel.try_recv())
    }

    fn handle_envelope(
        &mut self,
        envelope: Envelope,
        kinds: &MessageKinds,
        handlers: &mut HandlerRegistry,
        events: &mut Vec<PollEvent>,
    ) {
        if envelope.kind == self.control.heartbeat {
            // the timeout timer was already fed; nothing else to do
            return;
        }

        if let Some(result) = self.decode_control(&envelope) {
            match result {
                Ok(control) => events.push(PollEvent::Control(control)),
                Err(error) => {
                    // control traffic we cannot decode means the peers have
                    // lost protocol agreement; the session cannot continue
                    self.drop_peer(DisconnectReason::MalformedFrame);
                    events.push(PollEvent::Fault(SessionError::Transport(error.into())));
                }
            }
            return;
        }

        match handlers.dispatch(&envelope) {
            Ok(Dispatch::Handled) => {}
            Ok(Dispatch::NoHandler) => {
                if envelope.correlation.is_some() {
                    self.broker.note_orphan_response(&envelope);
                } else {
                    debug!(
                        "No handler registered for {}",
                        kinds.name_of(&envelope.kind).unwrap_or("unknown kind")
                    );
                }
            }
            Err(error) => {
                self.drop_peer(DisconnectReason::MalformedFrame);
                events.push(PollEvent::Fault(SessionError::Dispatch(error)));
            }
        }
    }

    fn decode_control(&self, envelope: &Envelope) -> Option<Result<ControlMessage, WireError>> {
        let kind = envelope.kind;
        if kind == self.control.handshake {
            Some(envelope.open::<Handshake>().map(ControlMessage::Handshake))
        } else if kind == self.control.handshake_ack {
            Some(
                envelope
                    .open::<HandshakeAck>()
                    .map(ControlMessage::HandshakeAck),
            )
        } else if kind == self.control.session {
            Some(envelope.open::<SessionCommand>().map(ControlMessage::Session))
        } else if kind == self.control.stream {
            Some(envelope.open::<StreamControl>().map(ControlMessage::Stream))
        } else {
            None
        }
    }

    fn throttle_entry(&mut self, stream: StreamId) -> &mut Throttle {
        let default_rate = self.config.default_stream_rate;
        let depth = self.config.throttle_queue_depth;
        self.throttles
            .entry(stream)
            .or_insert_with(|| Throttle::new(default_rate, depth))
    }

    /// Record that a message has been sent (to prevent needing to send a
    /// heartbeat)
    fn mark_sent(&mut self) {
        self.heartbeat_timer.reset();
    }

    fn on_connected(&mut self) {
        self.heartbeat_timer.reset();
        self.timeout_timer.reset();
        self.local_drop_reason = None;
        for throttle in self.throttles.values_mut() {
            throttle.reset();
        }
    }

    fn on_disconnected(&mut self) {
        self.broker.clear_pending();
        for throttle in self.throttles.values_mut() {
            throttle.reset();
        }
    }
}
