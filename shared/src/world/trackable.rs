use serde::{Deserialize, Serialize};

/// Stable identity of one remotely-observed entity.
///
/// Assigned by the producing side, immutable once assigned, unique within
/// one reconciler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackableId(pub u64);

/// Where an entity sits in its lifecycle as of the current change-set
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackingState {
    Added,
    Updated,
    Removed,
    Unchanged,
}

/// One tracked entity as surfaced to the consumer
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedEntity<P> {
    pub id: TrackableId,
    pub payload: P,
    pub state: TrackingState,
}

impl<P> TrackedEntity<P> {
    pub fn new(id: TrackableId, payload: P, state: TrackingState) -> Self {
        Self { id, payload, state }
    }
}
