use thiserror::Error;

use crate::{
    connection::config::ConnectionConfig,
    messages::{
        message::{Message, Request},
        message_kinds::MessageKinds,
    },
    session::{Handshake, HandshakeAck, Heartbeat, SessionCommand, StreamControl},
};

/// Errors raised while building or using a Protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol was already locked when a mutation was attempted
    #[error("Protocol already locked")]
    AlreadyLocked,

    /// The same message type was added twice
    #[error("Message type {name} added twice")]
    DuplicateMessage { name: &'static str },

    /// A message type was used without being added
    #[error("Message type {name} was never added to the protocol")]
    UnregisteredMessage { name: &'static str },

    /// The kind index space is exhausted
    #[error("Cannot add {name}: message registry is full")]
    RegistryFull { name: &'static str },
}

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

/// Everything both peers must agree on before a session can start: the
/// registered message set and the connection tuning knobs.
///
/// Built once, locked by the Host/Device constructor, identical on both
/// sides.
pub struct Protocol {
    pub message_kinds: MessageKinds,
    /// Used to configure the transport channel and call broker
    pub connection: ConnectionConfig,
    locked: bool,
}

impl Default for Protocol {
    fn default() -> Self {
        let mut message_kinds = MessageKinds::new();
        // Built-in control messages occupy the first kinds on both peers.
        // Registration order is part of the wire contract.
        message_kinds
            .add_message::<Heartbeat>()
            .expect("empty registry cannot reject Heartbeat");
        message_kinds
            .add_message::<Handshake>()
            .expect("fresh registry cannot hold Handshake");
        message_kinds
            .add_message::<HandshakeAck>()
            .expect("fresh registry cannot hold HandshakeAck");
        message_kinds
            .add_message::<SessionCommand>()
            .expect("fresh registry cannot hold SessionCommand");
        message_kinds
            .add_message::<StreamControl>()
            .expect("fresh registry cannot hold StreamControl");

        Self {
            message_kinds,
            connection: ConnectionConfig::default(),
            locked: false,
        }
    }
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    pub fn connection_config(&mut self, config: ConnectionConfig) -> &mut Self {
        self.check_lock();
        self.connection = config;
        self
    }

    pub fn add_message<M: Message>(&mut self) -> &mut Self {
        self.check_lock();
        self.message_kinds
            .add_message::<M>()
            .expect("Message type added twice!");
        self
    }

    pub fn add_request<Q: Request>(&mut self) -> &mut Self {
        self.check_lock();
        // Requests and responses dispatch just like messages
        self.message_kinds
            .add_message::<Q>()
            .expect("Request type added twice!");
        self.message_kinds
            .add_message::<Q::Response>()
            .expect("Response type added twice!");
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(
        &mut self,
        plugin: P,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_connection_config(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.connection = config;
        Ok(self)
    }

    pub fn try_add_message<M: Message>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.message_kinds.add_message::<M>()?;
        Ok(self)
    }

    pub fn try_add_request<Q: Request>(&mut self) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        self.message_kinds.add_message::<Q>()?;
        self.message_kinds.add_message::<Q::Response>()?;
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    /// Checks if protocol is locked without panicking
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    /// Number of registered kinds; pinned by the handshake
    pub fn kind_count(&self) -> u16 {
        self.message_kinds.len() as u16
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }
}
