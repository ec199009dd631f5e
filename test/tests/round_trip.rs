//! A payload sent by one side with a registered handler on the other
//! arrives equal, post-deserialization, on a later tick.

use std::{cell::RefCell, rc::Rc};

use tether_device::Device;
use tether_host::Host;
use tether_test::{
    helpers::{establish_session, exchange_until, loopback_address},
    test_protocol::{test_protocol, DebugCommand, DevicePose},
};

#[test]
fn device_to_host_round_trip() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());

    let received: Rc<RefCell<Vec<DevicePose>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    host.register::<DevicePose>(move |pose| sink.borrow_mut().push(pose));

    establish_session(&mut host, &mut device);

    let sent = DevicePose {
        position: [1.0, 2.0, 3.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };
    device.send(&sent);

    let arrived = exchange_until(&mut host, &mut device, 2_000, |_, _| {
        !received.borrow().is_empty()
    });
    assert!(arrived, "pose never arrived");
    assert_eq!(received.borrow().as_slice(), &[sent]);
}

#[test]
fn host_to_device_round_trip() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());

    let received: Rc<RefCell<Vec<DebugCommand>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();
    device.register::<DebugCommand>(move |command| sink.borrow_mut().push(command));

    establish_session(&mut host, &mut device);

    let sent = DebugCommand {
        text: "dump-anchors".to_string(),
    };
    host.send(&sent);

    let arrived = exchange_until(&mut host, &mut device, 2_000, |_, _| {
        !received.borrow().is_empty()
    });
    assert!(arrived, "command never arrived");
    assert_eq!(received.borrow().as_slice(), &[sent]);
}

#[test]
fn send_while_disconnected_is_silently_dropped() {
    let mut host = Host::new(test_protocol());
    // never connected: must not panic or error
    host.send(&DebugCommand {
        text: "into the void".to_string(),
    });
    let events = host.receive();
    assert!(events.is_empty());
}

#[test]
fn handler_runs_on_the_tick_thread() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());

    let tick_thread = std::thread::current().id();
    let observed: Rc<RefCell<Option<std::thread::ThreadId>>> = Rc::new(RefCell::new(None));
    let sink = observed.clone();
    host.register::<DevicePose>(move |_| {
        *sink.borrow_mut() = Some(std::thread::current().id());
    });

    establish_session(&mut host, &mut device);
    device.send(&DevicePose {
        position: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    });

    let arrived = exchange_until(&mut host, &mut device, 2_000, |_, _| {
        observed.borrow().is_some()
    });
    assert!(arrived, "pose never arrived");
    assert_eq!(*observed.borrow(), Some(tick_thread));
}
