use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by both peers' connections
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest frame either peer will encode or accept; oversized inbound
    /// frames drop the link
    pub max_message_size: usize,
    /// Bound of the outbound queue; best-effort sends are dropped once the
    /// queue backs up past the throttle's depth gate, and any send is dropped
    /// once it is full
    pub outbound_queue_size: usize,
    /// Bound of the inbound queue drained by the tick loop
    pub inbound_queue_size: usize,
    /// Hard deadline for one blocking call
    pub blocking_call_timeout: Duration,
    /// Blocking calls per second above which the rate guard warns
    pub call_rate_warning: u32,
    /// Idle interval after which a Heartbeat is sent
    pub heartbeat_interval: Duration,
    /// Silence interval after which the connection is considered dead
    pub connection_timeout: Duration,
    /// Deadline for the host's TCP connect attempt
    pub connect_timeout: Duration,
    /// Rate limit applied to a stream that has not been given its own
    pub default_stream_rate: f32,
    /// Outbound queue depth at which best-effort sends start dropping
    pub throttle_queue_depth: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024,
            outbound_queue_size: 64,
            inbound_queue_size: 1024,
            blocking_call_timeout: Duration::from_secs(10),
            call_rate_warning: 10,
            heartbeat_interval: Duration::from_secs(1),
            connection_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            default_stream_rate: 30.0,
            throttle_queue_depth: 2,
        }
    }
}
