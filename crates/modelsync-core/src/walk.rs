#![forbid(unsafe_code)]

//! Read-only recursive traversal over the model capability.

use ahash::AHashMap;

use crate::id::ModelId;
use crate::model::Model;

/// Pre-order visit: the root first, then each child subtree in child order.
pub fn visit_all<M: Model>(root: &M, f: &mut dyn FnMut(&M)) {
    f(root);
    root.for_each_child(&mut |child| visit_all(child, f));
}

/// Collect every identified node into an id → node map.
///
/// Later occurrences of the same id (in pre-order tree order) overwrite
/// earlier ones, which the engine relies on when comparing "old model by
/// id" against "new model by id".
#[must_use]
pub fn flatten_by_id<M: Model>(root: &M) -> AHashMap<ModelId, M> {
    let mut map = AHashMap::new();
    visit_all(root, &mut |node| {
        if let Some(id) = node.identity() {
            map.insert(id, node.clone());
        }
    });
    map
}

/// The ids of every identified node in pre-order, duplicates included.
#[must_use]
pub fn collect_ids<M: Model>(root: &M) -> Vec<ModelId> {
    let mut ids = Vec::new();
    visit_all(root, &mut |node| {
        if let Some(id) = node.identity() {
            ids.push(id);
        }
    });
    ids
}
