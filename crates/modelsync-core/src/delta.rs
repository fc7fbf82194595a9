#![forbid(unsafe_code)]

//! Change/delete id-sets delivered alongside a rebuilt tree.

use ahash::AHashSet;

use crate::id::ModelId;

/// The set of identified nodes that changed or disappeared between an
/// observer's previous root and the freshly rewritten one.
///
/// # Invariants (at delivery)
///
/// 1. `changed ∩ deleted = ∅` — a node that is gone is not also "changed";
///    delete wins. [`normalize`](Delta::normalize) enforces this.
/// 2. Every id in `deleted` is absent from the delivered root.
/// 3. Every id in `changed` is present in the delivered root with a value
///    not semantically equal to its previous one.
///
/// During accumulation (cascades mid-rewrite, pause buffering) the sets may
/// transiently overlap; the engine normalizes before anything observable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Delta {
    /// Ids present in the new root with a different value.
    pub changed: AHashSet<ModelId>,
    /// Ids present in the old root but absent from the new one.
    pub deleted: AHashSet<ModelId>,
}

impl Delta {
    /// An empty delta.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when neither set has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Record a changed id.
    pub fn mark_changed(&mut self, id: ModelId) {
        self.changed.insert(id);
    }

    /// Record a deleted id.
    pub fn mark_deleted(&mut self, id: ModelId) {
        self.deleted.insert(id);
    }

    /// Fold a newer delta into this accumulating one.
    ///
    /// This is the pause-buffer merge:
    /// `changed ← (changed ∪ sub.changed) \ (deleted ∪ sub.deleted)`,
    /// `deleted ← deleted ∪ sub.deleted`.
    pub fn merge(&mut self, sub: Delta) {
        self.changed.extend(sub.changed);
        self.deleted.extend(sub.deleted);
        let deleted = &self.deleted;
        self.changed.retain(|id| !deleted.contains(id));
    }

    /// Subtract `deleted` from `changed`, restoring invariant 1.
    pub fn normalize(&mut self) {
        let deleted = &self.deleted;
        self.changed.retain(|id| !deleted.contains(id));
    }

    /// [`normalize`](Self::normalize), by value.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}
