use std::collections::HashMap;

use log::warn;

use crate::messages::{
    envelope::{CorrelationId, Envelope},
    error::RegistryError,
    message::{Message, Request},
    message_kinds::{MessageKind, MessageKinds},
};

/// Capability to answer one inbound request; wraps the correlation id the
/// response must echo. Handed to request handlers, consumed by `respond`.
#[derive(Copy, Clone, Debug)]
pub struct ResponseKey {
    correlation: CorrelationId,
}

impl ResponseKey {
    pub(crate) fn new(correlation: CorrelationId) -> Self {
        Self { correlation }
    }

    pub fn correlation(&self) -> CorrelationId {
        self.correlation
    }
}

type BoxedHandler = Box<dyn FnMut(&Envelope) -> Result<(), RegistryError>>;

/// Outcome of offering an inbound envelope to the table
pub enum Dispatch {
    Handled,
    NoHandler,
}

/// Receive-side dispatch table: one handler per message kind, resolved at
/// registration time. Handlers always run on the tick thread.
pub struct HandlerRegistry {
    handlers: HashMap<MessageKind, BoxedHandler>,
    names: HashMap<MessageKind, &'static str>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Register the single handler for `M` (fallible version)
    pub fn try_register<M: Message>(
        &mut self,
        kinds: &MessageKinds,
        mut handler: impl FnMut(M) + 'static,
    ) -> Result<(), RegistryError> {
        let kind = kinds
            .kind_of::<M>()
            .map_err(|_| RegistryError::UnregisteredMessage { name: M::name() })?;
        self.insert_handler(
            kind,
            M::name(),
            Box::new(move |envelope: &Envelope| {
                let message = envelope
                    .open::<M>()
                    .map_err(|source| RegistryError::HandlerDecode {
                        name: M::name(),
                        source,
                    })?;
                handler(message);
                Ok(())
            }),
        )
    }

    /// Register the single handler for `M`
    ///
    /// Panics on duplicate registration: two owners for one message type is a
    /// programming error and must fail fast.
    pub fn register<M: Message>(&mut self, kinds: &MessageKinds, handler: impl FnMut(M) + 'static) {
        self.try_register(kinds, handler)
            .expect("Handler registered twice for one message type");
    }

    /// Register the single handler for request type `Q` (fallible version).
    ///
    /// The handler receives the decoded request plus the [`ResponseKey`] that
    /// a later `respond` call must consume.
    pub fn try_register_request<Q: Request>(
        &mut self,
        kinds: &MessageKinds,
        mut handler: impl FnMut(Q, ResponseKey) + 'static,
    ) -> Result<(), RegistryError> {
        let kind = kinds
            .kind_of::<Q>()
            .map_err(|_| RegistryError::UnregisteredMessage { name: Q::name() })?;
        self.insert_handler(
            kind,
            Q::name(),
            Box::new(move |envelope: &Envelope| {
                let Some(correlation) = envelope.correlation else {
                    // a request with no correlation id can never be answered
                    warn!("Dropping {} request sent without correlation id", Q::name());
                    return Ok(());
                };
                let request = envelope
                    .open::<Q>()
                    .map_err(|source| RegistryError::HandlerDecode {
                        name: Q::name(),
                        source,
                    })?;
                handler(request, ResponseKey::new(correlation));
                Ok(())
            }),
        )
    }

    /// Register the single handler for request type `Q`; panics on duplicates
    pub fn register_request<Q: Request>(
        &mut self,
        kinds: &MessageKinds,
        handler: impl FnMut(Q, ResponseKey) + 'static,
    ) {
        self.try_register_request(kinds, handler)
            .expect("Handler registered twice for one request type");
    }

    /// Remove the handler for `M`, returning whether one was registered
    pub fn unregister<M: Message>(&mut self, kinds: &MessageKinds) -> bool {
        let Ok(kind) = kinds.kind_of::<M>() else {
            return false;
        };
        self.names.remove(&kind);
        self.handlers.remove(&kind).is_some()
    }

    pub fn has_handler(&self, kind: &MessageKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Offer an inbound envelope to the registered handler for its kind
    pub fn dispatch(&mut self, envelope: &Envelope) -> Result<Dispatch, RegistryError> {
        match self.handlers.get_mut(&envelope.kind) {
            Some(handler) => {
                handler(envelope)?;
                Ok(Dispatch::Handled)
            }
            None => Ok(Dispatch::NoHandler),
        }
    }

    fn insert_handler(
        &mut self,
        kind: MessageKind,
        name: &'static str,
        handler: BoxedHandler,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&kind) {
            return Err(RegistryError::DuplicateHandler { name });
        }
        self.handlers.insert(kind, handler);
        self.names.insert(kind, name);
        Ok(())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
