use thiserror::Error;

use tether_shared::TransportError;

/// Errors raised by Host API misuse or by standing up the transport
#[derive(Debug, Error)]
pub enum HostError {
    /// `connect` was called while a session is already up or underway
    #[error("Host is already connected or connecting")]
    AlreadyConnected,

    /// The transport could not be created
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
