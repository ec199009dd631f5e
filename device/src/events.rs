use std::{net::SocketAddr, vec::IntoIter};

use tether_shared::{DisconnectReason, SessionCommand, SessionError, StreamId};

/// Everything one `Device::receive` pass produced, read out by event type
pub struct Events {
    connections: Vec<SocketAddr>,
    disconnections: Vec<DisconnectReason>,
    enabled_streams: Vec<StreamId>,
    disabled_streams: Vec<StreamId>,
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
            enabled_streams: Vec::new(),
            disabled_streams: Vec::new(),
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

    pub(crate) fn push_stream_enabled(&mut self, stream: StreamId) {
        self.enabled_streams.push(stream);
        self.empty = false;
    }

    pub(crate) fn push_stream_disabled(&mut self, stream: StreamId) {
        self.disabled_streams.push(stream);
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

// Stream Enabled Event (start capture hardware for this stream)
pub struct StreamEnabledEvent;
impl Event for StreamEnabledEvent {
    type Iter = IntoIter<StreamId>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.enabled_streams);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.enabled_streams.is_empty()
    }
}

// Stream Disabled Event (stop capture hardware for this stream)
pub struct StreamDisabledEvent;
impl Event for StreamDisabledEvent {
    type Iter = IntoIter<StreamId>;

    fn iter(events: &mut Events) -> Self::Iter {
        let list = std::mem::take(&mut events.disabled_streams);
        return IntoIterator::into_iter(list);
    }

    fn has(events: &Events) -> bool {
        !events.disabled_streams.is_empty()
    }
}

// Session Command Event
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
