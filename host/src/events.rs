use std::{net::SocketAddr, vec::IntoIter};

use tether_shared::{DisconnectReason, SessionCommand, SessionError, StreamId, StreamState};

/// Everything one `Host::receive` pass produced, read out by event type
pub struct Events {
    connections: Vec<SocketAddr>,
    disconnections: Vec<DisconnectReason>,
    stream_states: Vec<(StreamId, StreamState)>,
    commands: Vec<SessionCommand>,
    errors: Vec<SessionError>,
    empty: bool,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    pub(crate) fn new() -> Self {
        Self {
            connections: Vec::new(),
            disconnections: Vec::new(),
            stream_states: Vec::new(),
            commands: Vec::new(),
            errors: Vec::new(),
            empty: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn read<V: Event>(&mut self) -> V::Iter {
        return V::iter(self);
    }

    pub fn has<V: Event>(&self) -> bool {
        return V::has(self);
    }

    pub(crate) fn push_connection(&mut self, address: SocketAddr) {
        self.connections.push(address);
        self.empty = false;
    }

    pub(crate) fn push_disconnection(&mut self, reason: DisconnectReason) {
        self.disconnections.push(reason);
        self.empty = false;
    }

    pub(crate) fn push_stream_state(&mut self, stream: StreamId, state: StreamState) {
        self.stream_states.push((stream, state));
        self.empty = false;
    }

    pub(crate) fn push_command(&mut self, command: SessionCommand) {
        self.commands.push(command);
        self.empty = false;
    }

    pub(crate) fn push_error(&mut self, error: SessionError) {
        self.errors.push(error);
        self.empty = false;
    }
}

// Event Trait
pub trait Event {
    type Iter;

    fn iter(events: &mut Events) -> Self::Iter;

    fn has(events: &Events) -> bool;
}

// Connect Event
pub struct ConnectEvent;
impl Event for ConnectEvent {
    type Iter = IntoIter<SocketAddr>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.connections);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.connections.is_empty()
    }
}

// Disconnect Event
pub struct DisconnectEvent;
impl Event for DisconnectEvent {
    type Iter = IntoIter<DisconnectReason>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.disconnections);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.disconnections.is_empty()
    }
}

// Stream State Event (the device applied an enable/disable and echoed it)
pub struct StreamStateEvent;
impl Event for StreamStateEvent {
    type Iter = IntoIter<(StreamId, StreamState)>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.stream_states);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.stream_states.is_empty()
    }
}

// Session Command Event (device-initiated session transitions)
pub struct SessionCommandEvent;
impl Event for SessionCommandEvent {
    type Iter = IntoIter<SessionCommand>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.commands);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.commands.is_empty()
    }
}

// Error Event
pub struct ErrorEvent;
impl Event for ErrorEvent {
    type Iter = IntoIter<SessionError>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.errors);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.errors.is_empty()
    }
}
