//! Runs a Device on its own thread for tests where the host's tick thread
//! is deliberately blocked (blocking-call scenarios).

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use tether_device::Device;
use tether_shared::Protocol;

use crate::helpers::loopback_address;

/// A Device ticking on a background thread until dropped
pub struct DeviceRunner {
    pub address: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceRunner {
    /// Bind a device on an ephemeral loopback port and tick it in the
    /// background. `setup` runs once before the loop (register handlers
    /// there); `on_tick` runs after every `receive` (drain request queues
    /// and respond there).
    pub fn spawn<S, T>(protocol: impl FnOnce() -> Protocol + Send + 'static, setup: S, mut on_tick: T) -> Self
    where
        S: FnOnce(&mut Device) + Send + 'static,
        T: FnMut(&mut Device) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let (address_tx, address_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("test-device".to_string())
            .spawn(move || {
                let mut device = Device::new(protocol(), loopback_address()).expect("bind device");
                address_tx
                    .send(device.local_addr().expect("device has a bound address"))
                    .expect("report device address");
                setup(&mut device);
                while !stop_flag.load(Ordering::Relaxed) {
                    let _ = device.receive();
                    on_tick(&mut device);
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .expect("spawn device thread");

        let address = address_rx.recv().expect("device thread reported address");
        Self {
            address,
            stop,
            handle: Some(handle),
        }
    }

    /// Stop ticking and drop the device (closing its socket)
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
