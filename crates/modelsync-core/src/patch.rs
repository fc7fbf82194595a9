#![forbid(unsafe_code)]

//! Whole-node replacements and deletions, keyed by id.

use ahash::AHashMap;

use crate::id::ModelId;
use crate::model::Model;
use crate::walk::flatten_by_id;

/// A batch of updates to apply to an observer's tree.
///
/// Each entry maps an id to either a replacement subtree (`Some`) or a
/// deletion (`None`). A publish produces replacement entries for every
/// identified node in the published subtree; a delete produces a single
/// `None` entry.
#[derive(Clone, Debug, Default)]
pub struct Patch<M: Model> {
    entries: AHashMap<ModelId, Option<M>>,
}

impl<M: Model> Patch<M> {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Flatten a published subtree into replacement entries.
    ///
    /// Every identified node in `root` becomes an entry; later tree-order
    /// occurrences of a duplicate id win.
    #[must_use]
    pub fn from_tree(root: &M) -> Self {
        let entries = flatten_by_id(root)
            .into_iter()
            .map(|(id, node)| (id, Some(node)))
            .collect();
        Self { entries }
    }

    /// A patch deleting a single id.
    #[must_use]
    pub fn delete_one(id: ModelId) -> Self {
        let mut patch = Self::new();
        patch.entries.insert(id, None);
        patch
    }

    /// Insert a replacement entry.
    pub fn insert_replace(&mut self, node: M) {
        if let Some(id) = node.identity() {
            self.entries.insert(id, Some(node));
        }
    }

    /// Insert a deletion entry.
    pub fn insert_delete(&mut self, id: ModelId) {
        self.entries.insert(id, None);
    }

    /// Look up the entry for `id`, if any.
    #[must_use]
    pub fn get(&self, id: &ModelId) -> Option<&Option<M>> {
        self.entries.get(id)
    }

    /// The ids this patch touches.
    pub fn ids(&self) -> impl Iterator<Item = &ModelId> {
        self.entries.keys()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the patch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
