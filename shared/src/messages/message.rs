use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// A unit of communication between the two peers.
///
/// Implementors are plain serde structs; the wire representation is owned by
/// the [`Envelope`](crate::messages::envelope::Envelope) layer, so a message
/// type carries no routing metadata of its own.
pub trait Message: Serialize + DeserializeOwned + Debug + Send + Sync + 'static {
    /// Display name used in logs and errors
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// A message that expects a typed reply carrying the caller's correlation id.
///
/// Registering a request via `Protocol::add_request` registers the response
/// type as well, so both directions resolve to known kinds.
pub trait Request: Message {
    type Response: Message;
}
