//! Integration-test support for the tether workspace: a shared test
//! protocol and helpers for driving host/device pairs.

pub mod test_protocol;
