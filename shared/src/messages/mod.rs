pub mod envelope;
pub mod error;
pub mod handler_registry;
pub mod message;
pub mod message_kinds;
