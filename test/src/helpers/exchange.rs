//! Tick-pumping helpers for tests that drive both peers on one thread.

use std::{
    net::SocketAddr,
    thread,
    time::{Duration, Instant},
};

use tether_device::Device;
use tether_host::Host;

pub fn loopback_address() -> SocketAddr {
    "127.0.0.1:0".parse().expect("loopback address parses")
}

/// Tick both peers until `done` reports success or `deadline_ms` elapses.
/// Returns whether the condition was reached.
pub fn exchange_until(
    host: &mut Host,
    device: &mut Device,
    deadline_ms: u64,
    mut done: impl FnMut(&mut Host, &mut Device) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    loop {
        let _ = host.receive();
        let _ = device.receive();
        if done(host, device) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Connect `host` to `device` and pump both until the session is up
pub fn establish_session(host: &mut Host, device: &mut Device) {
    let address = device.local_addr().expect("device has a bound address");
    host.connect(address).expect("host connect");
    let connected = exchange_until(host, device, 2_000, |host, device| {
        host.is_connected() && device.is_connected()
    });
    assert!(connected, "session did not establish within the deadline");
}
