use std::{any::TypeId, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::{messages::message::Message, protocol::ProtocolError};

/// Index of a registered message type.
///
/// Kinds are assigned in registration order, so both peers must build their
/// `Protocol` with an identical message set; the handshake carries the
/// registered count to catch drift early.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKind(u16);

impl MessageKind {
    pub fn to_index(self) -> u16 {
        self.0
    }
}

struct RegisteredMessage {
    name: &'static str,
}

/// Registry mapping message types to wire kinds, resolved once at
/// registration time so dispatch is a table lookup
pub struct MessageKinds {
    by_type: HashMap<TypeId, MessageKind>,
    registered: Vec<RegisteredMessage>,
}

impl MessageKinds {
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            registered: Vec::new(),
        }
    }

    pub fn add_message<M: Message>(&mut self) -> Result<MessageKind, ProtocolError> {
        let type_id = TypeId::of::<M>();
        if self.by_type.contains_key(&type_id) {
            return Err(ProtocolError::DuplicateMessage { name: M::name() });
        }
        let index = u16::try_from(self.registered.len())
            .map_err(|_| ProtocolError::RegistryFull { name: M::name() })?;
        let kind = MessageKind(index);
        self.by_type.insert(type_id, kind);
        self.registered.push(RegisteredMessage { name: M::name() });
        Ok(kind)
    }

    /// Resolve the kind for a registered message type
    pub fn kind_of<M: Message>(&self) -> Result<MessageKind, ProtocolError> {
        self.by_type
            .get(&TypeId::of::<M>())
            .copied()
            .ok_or(ProtocolError::UnregisteredMessage { name: M::name() })
    }

    pub fn is_registered<M: Message>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<M>())
    }

    /// Display name for a kind, if it maps to a registered type
    pub fn name_of(&self, kind: &MessageKind) -> Option<&'static str> {
        self.registered
            .get(usize::from(kind.0))
            .map(|registered| registered.name)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

impl Default for MessageKinds {
    fn default() -> Self {
        Self::new()
    }
}
