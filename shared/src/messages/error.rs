use thiserror::Error;

/// Errors produced while encoding or decoding message payloads
#[derive(Debug, Error)]
pub enum WireError {
    /// Payload could not be serialized
    #[error("Failed to encode {name} payload: {source}")]
    Encode {
        name: &'static str,
        source: bincode::Error,
    },

    /// Payload bytes did not decode as the expected type
    #[error("Failed to decode {name} payload: {source}")]
    Decode {
        name: &'static str,
        source: bincode::Error,
    },

    /// Envelope bytes were not a valid envelope
    #[error("Failed to decode envelope: {0}")]
    Envelope(#[source] bincode::Error),

    /// The message type was never added to the Protocol
    #[error("Cannot seal {name}: message type not in protocol")]
    Unregistered { name: &'static str },
}

/// Errors produced by the receive-side handler table
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A handler is already registered for this message type. Exactly one
    /// handler may own a type; this is a programming error in the adapter.
    #[error("A handler for {name} is already registered")]
    DuplicateHandler { name: &'static str },

    /// The message type was never added to the Protocol
    #[error("Cannot register handler for {name}: message type not in protocol")]
    UnregisteredMessage { name: &'static str },

    /// An inbound payload failed to decode inside its handler
    #[error("Handler for {name} received an undecodable payload")]
    HandlerDecode {
        name: &'static str,
        #[source]
        source: WireError,
    },
}
