use std::collections::HashMap;

use crate::world::{
    change_set::ChangeSet,
    trackable::{TrackableId, TrackedEntity, TrackingState},
};

/// Collapses staged add/update/remove batches into the minimal consistent
/// edit since the consumer's last poll.
///
/// The producer and consumer run at uncorrelated cadences: several events
/// for one entity may land between polls, batches may coalesce an add, an
/// update and a remove for the same id, and updates can arrive for entities
/// the consumer was never told about. The reconciler absorbs all of that —
/// the consumer never sees an entity appear and vanish in one poll, never
/// sees an update for an unknown id, and always sees `all()` agree with the
/// sum of every change-set it was handed.
pub struct Reconciler<P> {
    pending_added: HashMap<TrackableId, P>,
    pending_updated: HashMap<TrackableId, P>,
    pending_removed: HashMap<TrackableId, P>,
    all: HashMap<TrackableId, P>,
}

impl<P: Clone> Reconciler<P> {
    pub fn new() -> Self {
        Self {
            pending_added: HashMap::new(),
            pending_updated: HashMap::new(),
            pending_removed: HashMap::new(),
            all: HashMap::new(),
        }
    }

    /// Ingest one remote batch. Batches for one id may arrive in any mix;
    /// `added` is applied before `updated` before `removed`, matching the
    /// producer's staging order.
    pub fn receive(
        &mut self,
        added: Vec<(TrackableId, P)>,
        updated: Vec<(TrackableId, P)>,
        removed: Vec<TrackableId>,
    ) {
        for (id, payload) in added {
            // duplicate add is a no-op
            if self.all.contains_key(&id) {
                continue;
            }
            self.pending_added.insert(id, payload.clone());
            self.all.insert(id, payload);
        }

        for (id, payload) in updated {
            if !self.all.contains_key(&id) {
                // the consumer has never heard of this id; if it exists it
                // will surface as an add later with a fresher payload
                continue;
            }
            if let Some(staged) = self.pending_added.get_mut(&id) {
                // add not yet consumed: fold the update into it so the
                // consumer sees one add with the latest payload
                *staged = payload.clone();
                self.all.insert(id, payload);
                continue;
            }
            self.pending_updated.insert(id, payload.clone());
            self.all.insert(id, payload);
        }

        for id in removed {
            let was_pending_add = self.pending_added.remove(&id).is_some();
            self.pending_updated.remove(&id);
            let Some(last_payload) = self.all.remove(&id) else {
                continue;
            };
            if was_pending_add {
                // added and removed between polls: the consumer never
                // learned it existed, so it must not learn it died
                continue;
            }
            self.pending_removed.insert(id, last_payload);
        }
    }

    /// Materialize and clear the pending change-set. `all` persists, so an
    /// immediately repeated call returns an empty set.
    pub fn take_changes(&mut self) -> ChangeSet<P> {
        let added = std::mem::take(&mut self.pending_added)
            .into_iter()
            .map(|(id, payload)| TrackedEntity::new(id, payload, TrackingState::Added))
            .collect();
        let updated = std::mem::take(&mut self.pending_updated)
            .into_iter()
            .map(|(id, payload)| TrackedEntity::new(id, payload, TrackingState::Updated))
            .collect();
        let removed = std::mem::take(&mut self.pending_removed)
            .into_iter()
            .map(|(id, payload)| TrackedEntity::new(id, payload, TrackingState::Removed))
            .collect();
        ChangeSet {
            added,
            updated,
            removed,
        }
    }

    /// Forget everything: pending edits and the known-entity table.
    ///
    /// Used when the producing stream is disabled or the session is torn
    /// down, so the next enable starts clean and nothing is reported as
    /// spuriously removed.
    pub fn reset_all(&mut self) {
        self.pending_added.clear();
        self.pending_updated.clear();
        self.pending_removed.clear();
        self.all.clear();
    }

    /// Whether the next `take_changes` would return anything
    pub fn has_changes(&self) -> bool {
        !self.pending_added.is_empty()
            || !self.pending_updated.is_empty()
            || !self.pending_removed.is_empty()
    }

    /// The authoritative table of every entity the consumer currently
    /// believes exists (including adds staged for the next poll)
    pub fn all(&self) -> &HashMap<TrackableId, P> {
        &self.all
    }

    pub fn contains(&self, id: &TrackableId) -> bool {
        self.all.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl<P: Clone> Default for Reconciler<P> {
    fn default() -> Self {
        Self::new()
    }
}
