use serde::{Deserialize, Serialize};

use crate::messages::message::Message;

/// Bumped whenever the wire format or the built-in message set changes
pub const PROTOCOL_VERSION: u16 = 3;

/// Identifies one logical capture stream (camera, planes, anchors, ...).
/// Adapters allocate their own ids; the bridge treats them as opaque.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub u16);

/// Per-stream producer state, mirrored on both peers.
/// Capture hardware runs only while the stream is `Enabled`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    Disabled,
    Enabled,
}

impl StreamState {
    pub fn is_enabled(self) -> bool {
        self == StreamState::Enabled
    }
}

/// Whole-session control opcodes sent by the host
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    Resume,
    Pause,
    Reset,
    Destroy,
}

impl Message for SessionCommand {}

/// Enables or disables one capture stream. The receiving peer applies the
/// transition and echoes the same envelope back so both mirrors converge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamControl {
    pub stream: StreamId,
    pub enable: bool,
}

impl Message for StreamControl {}

/// First envelope on every fresh connection, host to device.
///
/// `kind_count` pins the registration-order message table: a device built
/// against a different protocol refuses the session instead of misrouting
/// envelopes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub protocol_version: u16,
    pub kind_count: u16,
    pub session_token: u64,
}

impl Message for Handshake {}

/// Device's acceptance of a handshake, echoing the session token
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeAck {
    pub session_token: u64,
}

impl Message for HandshakeAck {}

/// Keep-alive sent when a connection has been silent for a heartbeat interval
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat;

impl Message for Heartbeat {}
