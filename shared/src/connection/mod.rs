pub mod base_connection;
pub mod call_broker;
pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod throttle;
