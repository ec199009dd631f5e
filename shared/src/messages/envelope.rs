use serde::{Deserialize, Serialize};

use crate::messages::{
    error::WireError,
    message::Message,
    message_kinds::{MessageKind, MessageKinds},
};

/// Token pairing a blocking-call request with its eventual response.
///
/// Generated by the calling side, echoed verbatim by the responder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Normally minted by the call broker; constructing one by hand is only
    /// useful for custom brokers and tests
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Tagged unit of communication: a kind for receiver-side dispatch, the
/// serialized payload, and a correlation id on blocking-call traffic only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MessageKind,
    pub correlation: Option<CorrelationId>,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Seal a fire-and-forget message
    pub fn seal<M: Message>(kinds: &MessageKinds, message: &M) -> Result<Self, WireError> {
        let kind = kinds
            .kind_of::<M>()
            .map_err(|_| WireError::Unregistered { name: M::name() })?;
        let payload = bincode::serialize(message).map_err(|source| WireError::Encode {
            name: M::name(),
            source,
        })?;
        Ok(Self {
            kind,
            correlation: None,
            payload,
        })
    }

    /// Seal a blocking-call request or response, stamping the correlation id
    pub fn seal_correlated<M: Message>(
        kinds: &MessageKinds,
        message: &M,
        correlation: CorrelationId,
    ) -> Result<Self, WireError> {
        let mut envelope = Self::seal(kinds, message)?;
        envelope.correlation = Some(correlation);
        Ok(envelope)
    }

    /// Deserialize the payload as `M`. The caller is responsible for having
    /// matched `kind` first.
    pub fn open<M: Message>(&self) -> Result<M, WireError> {
        bincode::deserialize(&self.payload).map_err(|source| WireError::Decode {
            name: M::name(),
            source,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serialize(self).map_err(WireError::Envelope)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        bincode::deserialize(bytes).map_err(WireError::Envelope)
    }
}
