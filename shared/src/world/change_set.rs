use crate::world::trackable::TrackedEntity;

/// How the known-entity table changed since the consumer's last poll.
///
/// The three lists are disjoint by id: nothing is reported both added and
/// removed, and nothing is reported updated before its add was observed.
#[derive(Clone, Debug)]
pub struct ChangeSet<P> {
    pub added: Vec<TrackedEntity<P>>,
    pub updated: Vec<TrackedEntity<P>>,
    /// Removals carry the last payload the consumer was shown, so derived
    /// state can be torn down without a second lookup
    pub removed: Vec<TrackedEntity<P>>,
}

impl<P> ChangeSet<P> {
    pub fn empty() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

impl<P> Default for ChangeSet<P> {
    fn default() -> Self {
        Self::empty()
    }
}
