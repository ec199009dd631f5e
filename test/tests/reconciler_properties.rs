//! Property coverage for the reconciler: across arbitrary interleavings of
//! batches, polls, and resets, the consumer's view never contradicts the
//! authoritative table.

use std::collections::HashSet;

use proptest::prelude::*;

use tether_shared::{Reconciler, TrackableId};

#[derive(Clone, Debug)]
enum Op {
    Receive {
        added: Vec<(u64, u8)>,
        updated: Vec<(u64, u8)>,
        removed: Vec<u64>,
    },
    Take,
    Reset,
}

// a tiny id space forces add/update/remove collisions
fn id_strategy() -> impl Strategy<Value = u64> {
    0u64..8
}

fn batch_strategy() -> impl Strategy<Value = Vec<(u64, u8)>> {
    prop::collection::vec((id_strategy(), any::<u8>()), 0..5)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (
            batch_strategy(),
            batch_strategy(),
            prop::collection::vec(id_strategy(), 0..5)
        )
            .prop_map(|(added, updated, removed)| Op::Receive {
                added,
                updated,
                removed,
            }),
        2 => Just(Op::Take),
        1 => Just(Op::Reset),
    ]
}

proptest! {
    #[test]
    fn consumer_view_stays_consistent(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut reconciler: Reconciler<u8> = Reconciler::new();
        // ids the consumer currently believes exist, per the change sets
        // it has been handed
        let mut consumer: HashSet<TrackableId> = HashSet::new();

        for op in ops {
            match op {
                Op::Receive { added, updated, removed } => {
                    reconciler.receive(
                        added
                            .into_iter()
                            .map(|(id, payload)| (TrackableId(id), payload))
                            .collect(),
                        updated
                            .into_iter()
                            .map(|(id, payload)| (TrackableId(id), payload))
                            .collect(),
                        removed.into_iter().map(TrackableId).collect(),
                    );
                }
                Op::Take => {
                    let changes = reconciler.take_changes();

                    // the three lists are disjoint by id
                    let mut seen = HashSet::new();
                    for entity in changes
                        .added
                        .iter()
                        .chain(changes.updated.iter())
                        .chain(changes.removed.iter())
                    {
                        prop_assert!(seen.insert(entity.id), "id {:?} reported twice", entity.id);
                    }

                    for entity in &changes.added {
                        prop_assert!(
                            consumer.insert(entity.id),
                            "added {:?} which the consumer already knew",
                            entity.id
                        );
                    }
                    for entity in &changes.updated {
                        prop_assert!(
                            consumer.contains(&entity.id),
                            "updated {:?} before it was ever added",
                            entity.id
                        );
                    }
                    for entity in &changes.removed {
                        prop_assert!(
                            consumer.remove(&entity.id),
                            "removed {:?} which the consumer never knew",
                            entity.id
                        );
                    }

                    // with pending drained, the table and the consumer agree
                    let table: HashSet<TrackableId> = reconciler.all().keys().copied().collect();
                    prop_assert_eq!(&consumer, &table);

                    // idempotence: an immediate second poll yields nothing
                    prop_assert!(reconciler.take_changes().is_empty());
                }
                Op::Reset => {
                    reconciler.reset_all();
                    consumer.clear();
                    prop_assert!(reconciler.all().is_empty());
                    prop_assert!(!reconciler.has_changes());
                }
            }
        }
    }
}
