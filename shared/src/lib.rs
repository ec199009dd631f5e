//! # Tether Shared
//! Common functionality shared between tether-device & tether-host crates.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod connection;
mod messages;
mod protocol;
mod session;
mod timer;
mod world;

pub use connection::{
    base_connection::{BaseConnection, ControlMessage, PollEvent},
    call_broker::{CallBroker, PendingCall},
    channel::{Channel, ChannelEvent},
    config::ConnectionConfig,
    error::{CallError, DisconnectReason, SessionError, TransportError},
    frame::{encode_into, FrameReader, LENGTH_PREFIX_BYTES},
    throttle::Throttle,
};
pub use messages::{
    envelope::{CorrelationId, Envelope},
    error::{RegistryError, WireError},
    handler_registry::{Dispatch, HandlerRegistry, ResponseKey},
    message::{Message, Request},
    message_kinds::{MessageKind, MessageKinds},
};
pub use protocol::{Protocol, ProtocolError, ProtocolPlugin};
pub use session::{
    Handshake, HandshakeAck, Heartbeat, SessionCommand, StreamControl, StreamId, StreamState,
    PROTOCOL_VERSION,
};
pub use timer::Timer;
pub use world::{
    change_set::ChangeSet,
    reconciler::Reconciler,
    trackable::{TrackableId, TrackedEntity, TrackingState},
};
