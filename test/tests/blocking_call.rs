//! Blocking-call broker behavior: success, hard timeout, late responses,
//! and disconnect-during-wait.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use tether_host::{Host, SessionError};
use tether_shared::{CallError, ResponseKey};
use tether_test::{
    helpers::DeviceRunner,
    test_protocol::{test_connection_config, test_protocol, test_protocol_with, ConfigQuery, ConfigValue},
};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn wait_host_connected(host: &mut Host) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let _ = host.receive();
        if host.is_connected() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("host never established a session");
}

type PendingQueries = Arc<Mutex<Vec<(ConfigQuery, ResponseKey)>>>;

fn echoing_runner() -> DeviceRunner {
    let pending: PendingQueries = Arc::new(Mutex::new(Vec::new()));
    let inbox = pending.clone();
    DeviceRunner::spawn(
        test_protocol,
        move |device| {
            device.register_request::<ConfigQuery>(move |query, key| {
                inbox.lock().expect("inbox lock").push((query, key));
            });
        },
        move |device| {
            for (query, key) in pending.lock().expect("inbox lock").drain(..) {
                let response = ConfigValue {
                    value: format!("value-of-{}", query.key),
                    key: query.key,
                };
                device.respond::<ConfigQuery>(key, &response);
            }
        },
    )
}

#[test]
fn blocking_call_returns_the_matching_response() {
    init_logs();
    let runner = echoing_runner();
    let mut host = Host::new(test_protocol());
    host.connect(runner.address).expect("host connect");
    wait_host_connected(&mut host);

    let response = host
        .blocking_call(ConfigQuery {
            key: "camera-intrinsics".to_string(),
        })
        .expect("blocking call succeeds");

    assert_eq!(response.key, "camera-intrinsics");
    assert_eq!(response.value, "value-of-camera-intrinsics");
    assert!(!host.has_pending_call());
}

#[test]
fn blocking_call_times_out_and_clears_bookkeeping() {
    init_logs();
    // a device with no request handler never responds
    let runner = DeviceRunner::spawn(test_protocol, |_| {}, |_| {});
    let mut host = Host::new(test_protocol());
    host.connect(runner.address).expect("host connect");
    wait_host_connected(&mut host);

    let started = Instant::now();
    let result = host.blocking_call(ConfigQuery {
        key: "never-answered".to_string(),
    });

    assert!(matches!(result, Err(CallError::Timeout { .. })));
    // the configured timeout (500ms) elapsed, give or take scheduling
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(!host.has_pending_call());
}

#[test]
fn late_response_to_a_timed_out_call_is_ignored() {
    init_logs();
    let pending: PendingQueries = Arc::new(Mutex::new(Vec::new()));
    let inbox = pending.clone();
    let release = Arc::new(AtomicBool::new(false));
    let release_flag = release.clone();
    let responded = Arc::new(AtomicU32::new(0));
    let responded_count = responded.clone();

    let runner = DeviceRunner::spawn(
        test_protocol,
        move |device| {
            device.register_request::<ConfigQuery>(move |query, key| {
                inbox.lock().expect("inbox lock").push((query, key));
            });
        },
        move |device| {
            if !release_flag.load(Ordering::Relaxed) {
                return;
            }
            for (query, key) in pending.lock().expect("inbox lock").drain(..) {
                let response = ConfigValue {
                    value: format!("late-{}", query.key),
                    key: query.key,
                };
                device.respond::<ConfigQuery>(key, &response);
                responded_count.fetch_add(1, Ordering::Relaxed);
            }
        },
    );

    let mut host = Host::new(test_protocol());
    host.connect(runner.address).expect("host connect");
    wait_host_connected(&mut host);

    let result = host.blocking_call(ConfigQuery {
        key: "slow-query".to_string(),
    });
    assert!(matches!(result, Err(CallError::Timeout { .. })));
    assert!(!host.has_pending_call());

    // now let the device answer the call that already died
    release.store(true, Ordering::Relaxed);
    let deadline = Instant::now() + Duration::from_secs(2);
    while responded.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        let _ = host.receive();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(responded.load(Ordering::Relaxed), 1, "device never released the response");

    // the orphaned response must be dropped without faulting the session
    let mut saw_error = false;
    for _ in 0..100 {
        let mut events = host.receive();
        if events.has::<tether_host::ErrorEvent>() {
            let _errors: Vec<SessionError> = events.read::<tether_host::ErrorEvent>().collect();
            saw_error = true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!saw_error, "orphan response surfaced as a session error");
    assert!(host.is_connected(), "orphan response killed the session");

    // and a fresh call still pairs with its own response
    let response = host
        .blocking_call(ConfigQuery {
            key: "follow-up".to_string(),
        })
        .expect("follow-up call succeeds");
    assert_eq!(response.value, "late-follow-up");
}

#[test]
fn blocking_call_fails_loudly_when_the_peer_disappears_mid_wait() {
    init_logs();
    // long timeout so the disconnect, not the deadline, ends the wait
    let long_call_config = {
        let mut config = test_connection_config();
        config.blocking_call_timeout = Duration::from_secs(5);
        config
    };

    let ticks = Arc::new(AtomicU32::new(0));
    let tick_count = ticks.clone();
    let runner = DeviceRunner::spawn(
        move || test_protocol_with(long_call_config),
        |_| {},
        move |device| {
            // vanish shortly after the session is up
            if device.is_connected() && tick_count.fetch_add(1, Ordering::Relaxed) == 50 {
                device.destroy_session();
            }
        },
    );

    let mut host = Host::new(test_protocol_with({
        let mut config = test_connection_config();
        config.blocking_call_timeout = Duration::from_secs(5);
        config
    }));
    host.connect(runner.address).expect("host connect");
    wait_host_connected(&mut host);

    let started = Instant::now();
    let result = host.blocking_call(ConfigQuery {
        key: "doomed".to_string(),
    });

    assert!(matches!(result, Err(CallError::Disconnected { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!host.has_pending_call());

    // the disconnect surfaces as a tick event, and the session notice sticks
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut saw_disconnect = false;
    while Instant::now() < deadline {
        let mut events = host.receive();
        if events.has::<tether_host::DisconnectEvent>() {
            let _ = events.read::<tether_host::DisconnectEvent>().count();
            saw_disconnect = true;
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(saw_disconnect, "disconnect never surfaced on the tick thread");
    assert!(host.status_notice().is_some());
}

#[test]
fn blocking_call_while_disconnected_fails_immediately() {
    init_logs();
    let mut host = Host::new(test_protocol());
    let result = host.blocking_call(ConfigQuery {
        key: "nobody-home".to_string(),
    });
    assert!(matches!(result, Err(CallError::NotConnected { .. })));
}
