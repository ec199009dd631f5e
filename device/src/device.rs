use std::{collections::HashMap, net::SocketAddr};

use log::{debug, info, warn};

use tether_shared::{
    BaseConnection, CallError, Channel, ConnectionConfig, ControlMessage, DisconnectReason,
    HandlerRegistry, Handshake, HandshakeAck, Message, MessageKinds, PollEvent, Protocol,
    RegistryError, Request, ResponseKey, SessionCommand, SessionError, StreamControl, StreamId,
    StreamState, PROTOCOL_VERSION,
};

use crate::{error::DeviceError, events::Events};

/// Where the device stands with respect to its one host
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No host attached; accepting
    Listening,
    /// A host connected but has not handshaken yet
    AwaitingHandshake,
    /// Session established
    Connected,
}

/// The capture-device side of the bridge.
///
/// Accepts exactly one development host at a time, answers its handshake,
/// mirrors per-stream enable/disable commands so capture hardware runs only
/// while observed, and gates best-effort producer traffic through the
/// backpressure throttle. After a drop it returns to accepting; every new
/// session starts with all streams disabled.
pub struct Device {
    kinds: MessageKinds,
    handlers: HandlerRegistry,
    base: BaseConnection,
    state: SessionState,
    peer_address: Option<SocketAddr>,
    session_token: Option<u64>,
    paused: bool,
    stream_states: HashMap<StreamId, StreamState>,
}

impl Device {
    /// Create a new Device listening on `address`. Locks the protocol; bind
    /// errors surface synchronously.
    pub fn new(mut protocol: Protocol, address: SocketAddr) -> Result<Self, DeviceError> {
        protocol.lock();
        let kinds = protocol.message_kinds;
        let config: ConnectionConfig = protocol.connection;
        let channel = Channel::listen(address, &config)?;
        let base = BaseConnection::new(channel, &kinds, &config);
        Ok(Self {
            kinds,
            handlers: HandlerRegistry::new(),
            base,
            state: SessionState::Listening,
            peer_address: None,
            session_token: None,
            paused: false,
            stream_states: HashMap::new(),
        })
    }

    /// Actual bound address (resolves a port-0 bind)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.base.local_addr()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.base.is_connected()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether producers for `stream` should currently be running
    pub fn stream_enabled(&self, stream: StreamId) -> bool {
        self.stream_states
            .get(&stream)
            .copied()
            .unwrap_or(StreamState::Disabled)
            .is_enabled()
    }

    // Tick

    /// Drain one tick's worth of traffic: answer handshakes, apply stream
    /// and session commands, dispatch handlers, and return events.
    pub fn receive(&mut self) -> Events {
        let mut events = Events::new();
        let polled = self.base.poll(&self.kinds, &mut self.handlers);

        for event in polled {
            match event {
                PollEvent::Connected(address) => {
                    info!("Host connected from {}", address);
                    self.peer_address = Some(address);
                    self.state = SessionState::AwaitingHandshake;
                }
                PollEvent::Control(ControlMessage::Handshake(handshake)) => {
                    self.on_handshake(handshake, &mut events);
                }
                PollEvent::Control(ControlMessage::HandshakeAck(_)) => {
                    debug!("Ignoring handshake ack sent by the host");
                }
                PollEvent::Control(ControlMessage::Stream(control)) => {
                    if self.state == SessionState::Connected {
                        self.apply_stream_control(control, &mut events);
                    } else {
                        debug!("Ignoring stream control before handshake");
                    }
                }
                PollEvent::Control(ControlMessage::Session(command)) => {
                    self.apply_session_command(command, &mut events);
                }
                PollEvent::Disconnected(reason) => {
                    info!("Host disconnected: {}", reason);
                    self.clear_session(&mut events);
                    events.push_disconnection(reason);
                }
                PollEvent::Fault(error) => {
                    events.push_error(error);
                }
            }
        }

        events
    }

    // Registration

    /// Register the single handler for message type `M` (fallible version)
    pub fn try_register<M: Message>(
        &mut self,
        handler: impl FnMut(M) + 'static,
    ) -> Result<(), RegistryError> {
        self.handlers.try_register(&self.kinds, handler)
    }

    /// Register the single handler for message type `M`; panics on a
    /// duplicate registration
    pub fn register<M: Message>(&mut self, handler: impl FnMut(M) + 'static) {
        self.handlers.register(&self.kinds, handler);
    }

    /// Register the single handler for request type `Q` (fallible version)
    pub fn try_register_request<Q: Request>(
        &mut self,
        handler: impl FnMut(Q, ResponseKey) + 'static,
    ) -> Result<(), RegistryError> {
        self.handlers.try_register_request(&self.kinds, handler)
    }

    /// Register the single handler for request type `Q`; panics on a
    /// duplicate registration
    pub fn register_request<Q: Request>(&mut self, handler: impl FnMut(Q, ResponseKey) + 'static) {
        self.handlers.register_request(&self.kinds, handler);
    }

    /// Remove the handler for `M`, returning whether one was registered
    pub fn unregister<M: Message>(&mut self) -> bool {
        self.handlers.unregister::<M>(&self.kinds)
    }

    // Outgoing traffic

    /// Queue a critical message. A send while no host is attached is
    /// dropped silently; it never errors.
    pub fn send<M: Message>(&mut self, message: &M) {
        self.base.send(&self.kinds, message);
    }

    /// Queue a best-effort producer message on `stream`. Dropped (returning
    /// false) while the session is paused, the stream disabled, the rate
    /// gate closed, or the outbound queue backed up.
    pub fn send_best_effort<M: Message>(&mut self, stream: StreamId, message: &M) -> bool {
        if self.paused || self.state != SessionState::Connected {
            return false;
        }
        if !self.stream_enabled(stream) {
            return false;
        }
        self.base.send_best_effort(&self.kinds, stream, message)
    }

    /// Issue a synchronous call against the host and block for the response
    pub fn blocking_call<Q: Request>(&mut self, request: Q) -> Result<Q::Response, CallError> {
        self.base.blocking_call(&self.kinds, request)
    }

    /// Answer a request received through a registered request handler
    pub fn respond<Q: Request>(&mut self, key: ResponseKey, response: &Q::Response) {
        self.base.respond::<Q>(&self.kinds, key, response);
    }

    /// Whether a blocking call's bookkeeping is currently live
    pub fn has_pending_call(&self) -> bool {
        self.base.has_pending_call()
    }

    /// Rate limit for best-effort producer traffic on `stream`
    pub fn set_stream_rate(&mut self, stream: StreamId, max_rate: f32) {
        self.base.set_stream_rate(stream, max_rate);
    }

    /// End the current session from the device side, telling the host first.
    /// The device keeps listening for a fresh host afterwards.
    pub fn destroy_session(&mut self) {
        if self.state != SessionState::Listening {
            self.send(&SessionCommand::Destroy);
            self.base.drop_peer(DisconnectReason::LocalShutdown);
        }
    }

    // Internal

    fn on_handshake(&mut self, handshake: Handshake, events: &mut Events) {
        let local_kinds = self.kinds.len() as u16;
        if handshake.protocol_version != PROTOCOL_VERSION || handshake.kind_count != local_kinds {
            warn!(
                "Rejecting handshake: peer v{}/{} kinds, local v{}/{} kinds",
                handshake.protocol_version, handshake.kind_count, PROTOCOL_VERSION, local_kinds
            );
            events.push_error(SessionError::HandshakeRejected {
                peer_version: handshake.protocol_version,
                local_version: PROTOCOL_VERSION,
                peer_kinds: handshake.kind_count,
                local_kinds,
            });
            self.base.drop_peer(DisconnectReason::HandshakeRejected);
            return;
        }

        // fresh session: nothing from the previous one survives
        self.stream_states.clear();
        self.paused = false;
        self.session_token = Some(handshake.session_token);
        self.state = SessionState::Connected;
        self.send(&HandshakeAck {
            session_token: handshake.session_token,
        });
        info!("Session {:#x} established", handshake.session_token);
        if let Some(address) = self.peer_address {
            events.push_connection(address);
        }
    }

    fn apply_stream_control(&mut self, control: StreamControl, events: &mut Events) {
        let next = if control.enable {
            StreamState::Enabled
        } else {
            StreamState::Disabled
        };
        let previous = self
            .stream_states
            .insert(control.stream, next)
            .unwrap_or(StreamState::Disabled);
        if previous != next {
            if next.is_enabled() {
                events.push_stream_enabled(control.stream);
            } else {
                events.push_stream_disabled(control.stream);
            }
        }
        // echo so the host's mirror converges on what was actually applied
        self.send(&control);
    }

    fn apply_session_command(&mut self, command: SessionCommand, events: &mut Events) {
        match command {
            SessionCommand::Pause => self.paused = true,
            SessionCommand::Resume => self.paused = false,
            SessionCommand::Reset => {
                self.paused = false;
                self.disable_all_streams(events);
            }
            SessionCommand::Destroy => {
                self.base.drop_peer(DisconnectReason::ClosedByPeer);
            }
        }
        events.push_command(command);
    }

    fn disable_all_streams(&mut self, events: &mut Events) {
        for (stream, state) in self.stream_states.iter_mut() {
            if state.is_enabled() {
                *state = StreamState::Disabled;
                events.push_stream_disabled(*stream);
            }
        }
    }

    fn clear_session(&mut self, events: &mut Events) {
        if let Some(token) = self.session_token.take() {
            debug!("Session {:#x} cleared", token);
        }
        self.disable_all_streams(events);
        self.stream_states.clear();
        self.paused = false;
        self.peer_address = None;
        self.state = SessionState::Listening;
    }
}
