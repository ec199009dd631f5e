use std::{collections::HashMap, net::SocketAddr};

use log::{debug, info};

use tether_shared::{
    BaseConnection, CallError, Channel, ConnectionConfig, ControlMessage, DisconnectReason,
    Handshake, HandlerRegistry, Message, MessageKinds, PollEvent, Protocol, RegistryError, Request,
    ResponseKey, SessionCommand, StreamControl, StreamId, StreamState, PROTOCOL_VERSION,
};

use crate::{error::HostError, events::Events};

/// Where the host's one session currently stands. Driven entirely by
/// `receive()`; there is no hidden wait anywhere.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session yet, or the last one was torn down on purpose
    Disconnected,
    /// TCP connect in flight on the I/O thread
    Connecting,
    /// Link is up; our handshake is awaiting the device's ack
    Handshaking,
    /// Session established
    Connected,
    /// The session died underneath us; a fresh `connect` is required
    Destroyed,
}

/// The development-host side of the bridge.
///
/// Owns the one connection to the capture device, dispatches inbound
/// payloads to registered handlers on the tick thread, mirrors per-stream
/// capture state, and tears the whole session down on connection loss —
/// running every registered reset hook so no stale entity survives into the
/// next session.
pub struct Host {
    kinds: MessageKinds,
    config: ConnectionConfig,
    handlers: HandlerRegistry,
    base: Option<BaseConnection>,
    state: ConnectionState,
    peer_address: Option<SocketAddr>,
    session_token: Option<u64>,
    paused: bool,
    stream_states: HashMap<StreamId, StreamState>,
    stream_rates: HashMap<StreamId, f32>,
    reset_hooks: Vec<Box<dyn FnMut()>>,
    status_notice: Option<String>,
}

impl Host {
    /// Create a new Host. Locks the protocol: the message set is part of the
    /// wire contract from here on.
    pub fn new(mut protocol: Protocol) -> Self {
        protocol.lock();
        let kinds = protocol.message_kinds;
        let config = protocol.connection;
        Self {
            kinds,
            config,
            handlers: HandlerRegistry::new(),
            base: None,
            state: ConnectionState::Disconnected,
            peer_address: None,
            session_token: None,
            paused: false,
            stream_states: HashMap::new(),
            stream_rates: HashMap::new(),
            reset_hooks: Vec::new(),
            status_notice: None,
        }
    }

    // Connection lifecycle

    /// Begin connecting to a device. Completion is observed as a
    /// `ConnectEvent` from a later `receive()` once the handshake lands.
    pub fn connect(&mut self, address: SocketAddr) -> Result<(), HostError> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Destroyed => {}
            _ => return Err(HostError::AlreadyConnected),
        }
        let channel = Channel::connect(address, &self.config)?;
        let mut base = BaseConnection::new(channel, &self.kinds, &self.config);
        for (stream, rate) in &self.stream_rates {
            base.set_stream_rate(*stream, *rate);
        }
        self.base = Some(base);
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Tear the session down on purpose, telling the device first
    pub fn destroy_session(&mut self) {
        self.send_command(SessionCommand::Destroy);
        self.teardown(ConnectionState::Disconnected, None);
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.base.as_ref().is_some_and(|base| base.is_connected())
    }

    /// Persistent notice describing why the last session died, if it did
    pub fn status_notice(&self) -> Option<&str> {
        self.status_notice.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // Tick

    /// Drain one tick's worth of traffic: drive the connection state
    /// machine, dispatch handlers, and return session-level events.
    ///
    /// Disconnection always surfaces here, on the tick thread — never from
    /// the I/O context.
    pub fn receive(&mut self) -> Events {
        let mut events = Events::new();
        let polled = match self.base.as_mut() {
            Some(base) => base.poll(&self.kinds, &mut self.handlers),
            None => Vec::new(),
        };

        let mut lost: Option<DisconnectReason> = None;
        for event in polled {
            match event {
                PollEvent::Connected(address) => {
                    self.peer_address = Some(address);
                    self.state = ConnectionState::Handshaking;
                    let token = fastrand::u64(..);
                    self.session_token = Some(token);
                    let handshake = Handshake {
                        protocol_version: PROTOCOL_VERSION,
                        kind_count: self.kinds.len() as u16,
                        session_token: token,
                    };
                    if let Some(base) = self.base.as_mut() {
                        base.send(&self.kinds, &handshake);
                    }
                }
                PollEvent::Control(ControlMessage::HandshakeAck(ack)) => {
                    if self.state == ConnectionState::Handshaking
                        && self.session_token == Some(ack.session_token)
                    {
                        self.state = ConnectionState::Connected;
                        self.status_notice = None;
                        info!("Session {:#x} established", ack.session_token);
                        if let Some(address) = self.peer_address {
                            events.push_connection(address);
                        }
                    } else {
                        debug!("Ignoring handshake ack for a stale session");
                    }
                }
                PollEvent::Control(ControlMessage::Handshake(_)) => {
                    debug!("Ignoring handshake initiated by the device");
                }
                PollEvent::Control(ControlMessage::Stream(control)) => {
                    let state = if control.enable {
                        StreamState::Enabled
                    } else {
                        StreamState::Disabled
                    };
                    self.stream_states.insert(control.stream, state);
                    events.push_stream_state(control.stream, state);
                }
                PollEvent::Control(ControlMessage::Session(command)) => {
                    match command {
                        SessionCommand::Pause => self.paused = true,
                        SessionCommand::Resume => self.paused = false,
                        SessionCommand::Reset => self.reset_mirrors(),
                        SessionCommand::Destroy => {
                            if lost.is_none() {
                                events.push_disconnection(DisconnectReason::ClosedByPeer);
                                lost = Some(DisconnectReason::ClosedByPeer);
                            }
                        }
                    }
                    events.push_command(command);
                }
                PollEvent::Disconnected(reason) => {
                    if lost.is_none() {
                        events.push_disconnection(reason);
                        lost = Some(reason);
                    }
                }
                PollEvent::Fault(error) => {
                    events.push_error(error);
                }
            }
        }

        if let Some(reason) = lost {
            self.teardown(
                ConnectionState::Destroyed,
                Some(format!("Session lost: {}", reason)),
            );
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

    /// Run `hook` whenever the session resets: on connection loss and on a
    /// session reset. Adapters hook their reconcilers' `reset_all` here.
    pub fn add_reset_hook(&mut self, hook: impl FnMut() + 'static) {
        self.reset_hooks.push(Box::new(hook));
    }

    // Outgoing traffic

    /// Queue a critical message. A send while disconnected is dropped
    /// silently; it never errors.
    pub fn send<M: Message>(&mut self, message: &M) {
        if let Some(base) = self.base.as_mut() {
            base.send(&self.kinds, message);
        }
    }

    /// Queue a best-effort message on `stream`. Returns whether it was
    /// transmitted; throttled or paused sends are dropped, never buffered.
    pub fn send_best_effort<M: Message>(&mut self, stream: StreamId, message: &M) -> bool {
        if self.paused {
            return false;
        }
        match self.base.as_mut() {
            Some(base) => base.send_best_effort(&self.kinds, stream, message),
            None => false,
        }
    }

    /// Issue a synchronous call and block this thread for the response.
    /// Only for call sites whose stack genuinely needs the result.
    pub fn blocking_call<Q: Request>(&mut self, request: Q) -> Result<Q::Response, CallError> {
        match self.base.as_mut() {
            Some(base) => base.blocking_call(&self.kinds, request),
            None => Err(CallError::NotConnected { name: Q::name() }),
        }
    }

    /// Answer a request received through a registered request handler
    pub fn respond<Q: Request>(&mut self, key: ResponseKey, response: &Q::Response) {
        if let Some(base) = self.base.as_mut() {
            base.respond::<Q>(&self.kinds, key, response);
        }
    }

    /// Whether a blocking call's bookkeeping is currently live
    pub fn has_pending_call(&self) -> bool {
        self.base
            .as_ref()
            .is_some_and(|base| base.has_pending_call())
    }

    // Stream lifecycle

    /// Ask the device to start capturing on `stream`. The mirror flips when
    /// the device applies the transition and echoes it.
    pub fn enable_stream(&mut self, stream: StreamId) {
        self.send_stream_control(stream, true);
    }

    /// Ask the device to stop capturing on `stream`
    pub fn disable_stream(&mut self, stream: StreamId) {
        self.send_stream_control(stream, false);
    }

    /// The host's mirror of the device-side stream state
    pub fn stream_state(&self, stream: StreamId) -> StreamState {
        self.stream_states
            .get(&stream)
            .copied()
            .unwrap_or(StreamState::Disabled)
    }

    /// Rate limit for best-effort traffic the host itself produces on
    /// `stream`. Applies to the current and any future connection.
    pub fn set_stream_rate(&mut self, stream: StreamId, max_rate: f32) {
        self.stream_rates.insert(stream, max_rate);
        if let Some(base) = self.base.as_mut() {
            base.set_stream_rate(stream, max_rate);
        }
    }

    // Session lifecycle

    pub fn pause_session(&mut self) {
        self.paused = true;
        self.send_command(SessionCommand::Pause);
    }

    pub fn resume_session(&mut self) {
        self.paused = false;
        self.send_command(SessionCommand::Resume);
    }

    /// Reset both peers to a clean slate without dropping the link: local
    /// mirrors and reconcilers reset now, the device disables every stream
    pub fn reset_session(&mut self) {
        self.send_command(SessionCommand::Reset);
        self.reset_mirrors();
    }

    // Internal

    fn send_command(&mut self, command: SessionCommand) {
        if let Some(base) = self.base.as_mut() {
            base.send(&self.kinds, &command);
        }
    }

    fn send_stream_control(&mut self, stream: StreamId, enable: bool) {
        if let Some(base) = self.base.as_mut() {
            base.send(&self.kinds, &StreamControl { stream, enable });
        }
    }

    fn reset_mirrors(&mut self) {
        self.stream_states.clear();
        for hook in &mut self.reset_hooks {
            hook();
        }
    }

    fn teardown(&mut self, state: ConnectionState, notice: Option<String>) {
        self.base = None;
        self.state = state;
        self.paused = false;
        self.session_token = None;
        self.peer_address = None;
        self.reset_mirrors();
        self.status_notice = notice;
    }
}
