//! # Tether Host
//! Development-host side of the tether bridge: connects to a capture
//! device, mirrors its tracked sensor state, and drives its capture
//! lifecycle, all from a single-threaded tick loop.

pub use tether_shared::{
    CallError, ChangeSet, ConnectionConfig, CorrelationId, DisconnectReason, Message, MessageKind,
    Protocol, Reconciler, RegistryError, Request, ResponseKey, SessionCommand, SessionError,
    StreamId, StreamState, TrackableId, TrackedEntity, TrackingState,
};

mod error;
mod events;
mod host;

pub use error::HostError;
pub use events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events, SessionCommandEvent,
    StreamStateEvent,
};
pub use host::{ConnectionState, Host};
