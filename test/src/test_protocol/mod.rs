//! Message set shared by every integration test: a plane-detection stream,
//! a low-value pose stream, a host command, and one blocking call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tether_shared::{ConnectionConfig, Message, Protocol, Request, StreamId, TrackableId};

pub const PLANES_STREAM: StreamId = StreamId(1);
pub const POSE_STREAM: StreamId = StreamId(2);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanePayload {
    pub center: [f32; 3],
    pub extent: [f32; 2],
    pub classification: u8,
}

/// One staged batch of plane changes, device to host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneBatch {
    pub added: Vec<(TrackableId, PlanePayload)>,
    pub updated: Vec<(TrackableId, PlanePayload)>,
    pub removed: Vec<TrackableId>,
}

impl Message for PlaneBatch {}

/// Best-effort device pose sample
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevicePose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl Message for DevicePose {}

/// Critical host-to-device command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugCommand {
    pub text: String,
}

impl Message for DebugCommand {}

/// Blocking query for one device configuration value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigQuery {
    pub key: String,
}

impl Message for ConfigQuery {}

impl Request for ConfigQuery {
    type Response = ConfigValue;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub key: String,
    pub value: String,
}

impl Message for ConfigValue {}

pub fn test_protocol() -> Protocol {
    test_protocol_with(test_connection_config())
}

pub fn test_protocol_with(config: ConnectionConfig) -> Protocol {
    let mut protocol = Protocol::builder();
    protocol
        .connection_config(config)
        .add_message::<PlaneBatch>()
        .add_message::<DevicePose>()
        .add_message::<DebugCommand>()
        .add_request::<ConfigQuery>();
    protocol.build()
}

/// Default config tightened for tests: short call timeout, quick heartbeats
pub fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig {
        blocking_call_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(100),
        connection_timeout: Duration::from_secs(2),
        ..ConnectionConfig::default()
    }
}

pub fn sample_plane(seed: u8) -> PlanePayload {
    PlanePayload {
        center: [f32::from(seed), 0.0, -1.0],
        extent: [2.0, 1.5],
        classification: seed % 4,
    }
}
