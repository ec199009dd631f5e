use std::io;

use thiserror::Error;

use crate::messages::error::{RegistryError, WireError};

/// Why a connection stopped being usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The connect attempt never reached the device
    ConnectFailed,
    /// The peer closed the socket
    ClosedByPeer,
    /// A frame exceeded the size cap or failed to decode
    MalformedFrame,
    /// The socket returned a fatal I/O error
    Io,
    /// Nothing was heard for the configured connection timeout
    TimedOut,
    /// The peers disagree on protocol version or message set
    HandshakeRejected,
    /// The local side tore the session down on purpose
    LocalShutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DisconnectReason::ConnectFailed => "connect attempt failed",
            DisconnectReason::ClosedByPeer => "closed by peer",
            DisconnectReason::MalformedFrame => "malformed frame",
            DisconnectReason::Io => "socket error",
            DisconnectReason::TimedOut => "connection timed out",
            DisconnectReason::HandshakeRejected => "handshake rejected",
            DisconnectReason::LocalShutdown => "local shutdown",
        };
        write!(f, "{}", text)
    }
}

/// Errors that can occur while standing up or feeding the transport channel
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listen address could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        source: io::Error,
    },

    /// A frame larger than the configured cap was produced or received
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// Inbound bytes did not parse as a framed envelope
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] WireError),

    /// The background I/O thread could not be spawned
    #[error("Failed to spawn I/O thread: {0}")]
    Spawn(#[source] io::Error),

    /// The background I/O thread is gone
    #[error("Transport channel is closed")]
    ChannelClosed,
}

/// Errors raised to the caller of a blocking call
#[derive(Debug, Error)]
pub enum CallError {
    /// No response of the expected type arrived in time. The pending call is
    /// cleared; a response arriving later is ignored.
    #[error("Blocking call {name} timed out after {elapsed_millis}ms")]
    Timeout {
        name: &'static str,
        elapsed_millis: u128,
    },

    /// The connection dropped while the caller was waiting
    #[error("Blocking call {name} failed: peer disconnected ({reason})")]
    Disconnected {
        name: &'static str,
        reason: DisconnectReason,
    },

    /// The call was issued while no peer was connected
    #[error("Blocking call {name} issued while disconnected")]
    NotConnected { name: &'static str },

    /// Request or response type missing from the protocol
    #[error("Blocking call uses unregistered type: {0}")]
    Unregistered(#[from] WireError),

    /// The matched response payload failed to decode
    #[error("Blocking call {name} received an undecodable response")]
    MalformedResponse {
        name: &'static str,
        #[source]
        source: WireError,
    },
}

/// Session-level faults surfaced as error events; non-fatal to the process,
/// fatal to the current session
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peers disagree on protocol version or registered message set
    #[error(
        "Handshake rejected: peer speaks protocol v{peer_version} with {peer_kinds} kinds, \
         local is v{local_version} with {local_kinds} kinds"
    )]
    HandshakeRejected {
        peer_version: u16,
        local_version: u16,
        peer_kinds: u16,
        local_kinds: u16,
    },

    /// An inbound payload failed to decode in its registered handler
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] RegistryError),

    /// The transport rejected an operation
    #[error("Transport fault: {0}")]
    Transport(#[from] TransportError),
}
