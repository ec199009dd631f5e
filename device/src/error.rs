use thiserror::Error;

use tether_shared::TransportError;

/// Errors raised while standing the device up
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The listen address could not be bound or the I/O thread not spawned
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
