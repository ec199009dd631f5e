//! End-to-end entity streaming: staged plane batches flow from the device
//! into a host-side reconciler, which collapses them into per-tick change
//! sets and forgets everything when the session dies.

use std::{
    cell::RefCell,
    rc::Rc,
    thread,
    time::{Duration, Instant},
};

use tether_device::Device;
use tether_host::{DisconnectEvent, Host};
use tether_shared::{Reconciler, TrackableId, TrackingState};
use tether_test::{
    helpers::{establish_session, exchange_until, loopback_address},
    test_protocol::{sample_plane, test_protocol, PlaneBatch, PlanePayload},
};

type SharedReconciler = Rc<RefCell<Reconciler<PlanePayload>>>;

/// Wire a host the way a plane-detection adapter would: batches feed the
/// reconciler, and the reconciler forgets everything when the session dies
fn plane_mirror(host: &mut Host) -> SharedReconciler {
    let reconciler: SharedReconciler = Rc::new(RefCell::new(Reconciler::new()));

    let feed = reconciler.clone();
    host.register::<PlaneBatch>(move |batch| {
        feed.borrow_mut()
            .receive(batch.added, batch.updated, batch.removed);
    });

    let reset = reconciler.clone();
    host.add_reset_hook(move || reset.borrow_mut().reset_all());

    reconciler
}

fn wait_for_changes(
    host: &mut Host,
    device: &mut Device,
    reconciler: &SharedReconciler,
) -> tether_shared::ChangeSet<PlanePayload> {
    let arrived = exchange_until(host, device, 2_000, |_, _| reconciler.borrow().has_changes());
    assert!(arrived, "no changes arrived before the deadline");
    reconciler.borrow_mut().take_changes()
}

#[test]
fn streamed_batches_surface_as_change_sets() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());
    let reconciler = plane_mirror(&mut host);
    establish_session(&mut host, &mut device);

    // two planes appear
    device.send(&PlaneBatch {
        added: vec![
            (TrackableId(1), sample_plane(1)),
            (TrackableId(2), sample_plane(2)),
        ],
        updated: vec![],
        removed: vec![],
    });
    let changes = wait_for_changes(&mut host, &mut device, &reconciler);
    assert_eq!(changes.added.len(), 2);
    assert!(changes.updated.is_empty());
    assert!(changes.removed.is_empty());
    assert!(changes
        .added
        .iter()
        .all(|entity| entity.state == TrackingState::Added));

    // one of them moves
    device.send(&PlaneBatch {
        added: vec![],
        updated: vec![(TrackableId(1), sample_plane(7))],
        removed: vec![],
    });
    let changes = wait_for_changes(&mut host, &mut device, &reconciler);
    assert!(changes.added.is_empty());
    assert_eq!(changes.updated.len(), 1);
    assert_eq!(changes.updated[0].id, TrackableId(1));
    assert_eq!(changes.updated[0].payload, sample_plane(7));

    // one disappears, reported with the last payload the consumer saw
    device.send(&PlaneBatch {
        added: vec![],
        updated: vec![],
        removed: vec![TrackableId(2)],
    });
    let changes = wait_for_changes(&mut host, &mut device, &reconciler);
    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.removed[0].id, TrackableId(2));
    assert_eq!(changes.removed[0].payload, sample_plane(2));
    assert_eq!(reconciler.borrow().len(), 1);
}

#[test]
fn coalesced_add_update_remove_is_fully_suppressed() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());
    let reconciler = plane_mirror(&mut host);
    establish_session(&mut host, &mut device);

    // a plane flickers in and out between two host polls, all in one batch
    device.send(&PlaneBatch {
        added: vec![(TrackableId(9), sample_plane(9))],
        updated: vec![(TrackableId(9), sample_plane(10))],
        removed: vec![TrackableId(9)],
    });
    // and an unrelated plane arrives afterwards so we know the batch landed
    device.send(&PlaneBatch {
        added: vec![(TrackableId(1), sample_plane(1))],
        updated: vec![],
        removed: vec![],
    });

    let changes = wait_for_changes(&mut host, &mut device, &reconciler);
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.added[0].id, TrackableId(1));
    assert!(changes.updated.is_empty());
    assert!(changes.removed.is_empty(), "the consumer must never learn id 9 existed");
    assert!(!reconciler.borrow().contains(&TrackableId(9)));
}

#[test]
fn update_before_first_poll_collapses_into_the_add() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());
    let reconciler = plane_mirror(&mut host);
    establish_session(&mut host, &mut device);

    device.send(&PlaneBatch {
        added: vec![(TrackableId(4), sample_plane(1))],
        updated: vec![],
        removed: vec![],
    });
    device.send(&PlaneBatch {
        added: vec![],
        updated: vec![(TrackableId(4), sample_plane(2))],
        removed: vec![],
    });

    // wait until both batches have been folded in
    let arrived = exchange_until(&mut host, &mut device, 2_000, |_, _| {
        reconciler
            .borrow()
            .all()
            .get(&TrackableId(4))
            .is_some_and(|payload| *payload == sample_plane(2))
    });
    assert!(arrived, "batches never arrived");

    let changes = reconciler.borrow_mut().take_changes();
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.added[0].payload, sample_plane(2));
    assert!(changes.updated.is_empty(), "one entity, one event: added with the latest payload");
}

#[test]
fn session_loss_resets_the_mirror() {
    let mut device = Device::new(test_protocol(), loopback_address()).expect("bind device");
    let mut host = Host::new(test_protocol());
    let reconciler = plane_mirror(&mut host);
    establish_session(&mut host, &mut device);

    device.send(&PlaneBatch {
        added: vec![(TrackableId(1), sample_plane(1))],
        updated: vec![],
        removed: vec![],
    });
    let changes = wait_for_changes(&mut host, &mut device, &reconciler);
    assert_eq!(changes.added.len(), 1);
    assert_eq!(reconciler.borrow().len(), 1);

    drop(device);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut saw_disconnect = false;
    while Instant::now() < deadline && !saw_disconnect {
        let mut events = host.receive();
        saw_disconnect = events.has::<DisconnectEvent>();
        let _ = events.read::<DisconnectEvent>().count();
        thread::sleep(Duration::from_millis(1));
    }
    assert!(saw_disconnect, "host never observed the disconnect");

    // nothing reported as spuriously removed; the table is simply gone
    assert!(reconciler.borrow().is_empty());
    assert!(!reconciler.borrow().has_changes());
}
