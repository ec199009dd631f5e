//! # Tether Device
//! Capture-device side of the tether bridge: accepts one development host,
//! streams tracked sensor state to it, and runs capture hardware only while
//! a host is observing.

pub use tether_shared::{
    CallError, ChangeSet, ConnectionConfig, CorrelationId, DisconnectReason, Message, MessageKind,
    Protocol, Reconciler, RegistryError, Request, ResponseKey, SessionCommand, SessionError,
    StreamId, StreamState, TrackableId, TrackedEntity, TrackingState,
};

mod device;
mod error;
mod events;

pub use device::{Device, SessionState};
pub use error::DeviceError;
pub use events::{
    ConnectEvent, DisconnectEvent, ErrorEvent, Event, Events, SessionCommandEvent,
    StreamDisabledEvent, StreamEnabledEvent,
};
