#![forbid(unsafe_code)]

//! The recursive rewrite: propagate a [`Patch`] through a tree.
//!
//! Given an observer's current root and a patch, [`rewrite`] rebuilds the
//! tree with every patched node replaced or deleted, and reports:
//!
//! - the new root (`None` when the root itself was deleted, directly or by
//!   cascade),
//! - a [`Delta`] of changed and deleted ids,
//! - the replacement subtrees that entered the tree (so the engine can
//!   index their descendants for future updates),
//! - the (old, new) replacement pairs for the will-replace delegate hook,
//! - whether any `map_children` implementation returned a node of the
//!   wrong kind.
//!
//! # Invariants
//!
//! 1. Every id in `delta.deleted` is absent from `new_root`.
//! 2. Every id in `delta.changed` occurs in `new_root` with a value not
//!    semantically equal to its value in the input root.
//! 3. A node with no identity never appears in the delta, though it is
//!    traversed and mapped like any other.
//! 4. Replacing a node with a semantically equal value is a no-op: the
//!    original node is kept and nothing is recorded.
//! 5. When `new_root` is `None`, `changed` and `introduced` are empty —
//!    nothing the rewrite built survives a root delete.
//!
//! The sets may transiently overlap when a directly patched node is also
//! swept away by an ancestor's cascade; the engine subtracts `deleted` from
//! `changed` at every observable boundary.

use crate::delta::Delta;
use crate::model::Model;
use crate::patch::Patch;

/// Everything a single rewrite produced.
#[derive(Clone, Debug)]
pub struct RewriteOutcome<M: Model> {
    /// The rebuilt root; `None` iff the root was deleted.
    pub new_root: Option<M>,
    /// Changed and deleted ids relative to the input root.
    pub delta: Delta,
    /// Replacement subtrees now living in the rebuilt tree.
    pub introduced: Vec<M>,
    /// (old, new) pairs, in rewrite order, for the will-replace hook.
    pub replacements: Vec<(M, M)>,
    /// A `map_children` implementation returned a node of a different kind.
    pub kind_mismatch: bool,
}

/// Mutable accumulator threaded by reference through the recursion.
#[derive(Default)]
struct RewriteAcc<M: Model> {
    delta: Delta,
    introduced: Vec<M>,
    replacements: Vec<(M, M)>,
    kind_mismatch: bool,
}

impl<M: Model> RewriteAcc<M> {
    fn weight(&self) -> usize {
        self.delta.changed.len() + self.delta.deleted.len()
    }
}

/// Rewrite `root` against `patch`.
#[must_use]
pub fn rewrite<M: Model>(root: &M, patch: &Patch<M>) -> RewriteOutcome<M> {
    let mut acc = RewriteAcc {
        delta: Delta::new(),
        introduced: Vec::new(),
        replacements: Vec::new(),
        kind_mismatch: false,
    };
    let new_root = rewrite_node(root, patch, &mut acc);
    if new_root.is_none() {
        // The whole tree is gone: nothing is "changed" and nothing that was
        // introduced mid-rewrite survives to be indexed. Replacement pairs
        // are kept; the will-replace hook reflects what the rewrite saw.
        acc.delta.changed.clear();
        acc.introduced.clear();
    }
    RewriteOutcome {
        new_root,
        delta: acc.delta,
        introduced: acc.introduced,
        replacements: acc.replacements,
        kind_mismatch: acc.kind_mismatch,
    }
}

fn rewrite_node<M: Model>(node: &M, patch: &Patch<M>, acc: &mut RewriteAcc<M>) -> Option<M> {
    // Direct patch hit on an identified node.
    if let Some(id) = node.identity()
        && let Some(entry) = patch.get(&id)
    {
        return match entry {
            None => {
                acc.delta.mark_deleted(id);
                None
            }
            Some(replacement) if replacement.semantic_eq(node) => {
                // Nothing observable changed; keep the original value.
                Some(node.clone())
            }
            Some(replacement) => {
                acc.replacements.push((node.clone(), replacement.clone()));
                // Patches aimed inside the replaced subtree still surface
                // as changed even though the whole subtree is swapped out.
                changed_submodel_ids(node, patch, &mut acc.delta);
                acc.delta.mark_changed(id);
                acc.introduced.push(replacement.clone());
                Some(replacement.clone())
            }
        };
    }

    // No direct hit: rewrite the children and see what happened below.
    let weight_before = acc.weight();
    let mapped = node.map_children(&mut |child| rewrite_node(child, patch, acc));

    match mapped {
        None => {
            // A required child went away; the delete cascades to this node.
            if let Some(id) = node.identity() {
                acc.delta.mark_deleted(id);
            }
            None
        }
        Some(mapped) => {
            if mapped.kind() != node.kind() {
                acc.kind_mismatch = true;
            }
            if acc.weight() != weight_before
                && let Some(id) = node.identity()
            {
                acc.delta.mark_changed(id);
            }
            Some(mapped)
        }
    }
}

/// Sweep the descendants of a wholesale-replaced node for further patch
/// hits, so an update inside the replaced subtree is still reported.
///
/// Visits children only (the replaced root is accounted for by the caller);
/// recurses into every child whether or not it matched.
fn changed_submodel_ids<M: Model>(old_root: &M, patch: &Patch<M>, delta: &mut Delta) {
    old_root.for_each_child(&mut |child| {
        if let Some(id) = child.identity()
            && let Some(Some(replacement)) = patch.get(&id)
            && !replacement.semantic_eq(child)
        {
            delta.mark_changed(id);
        }
        changed_submodel_ids(child, patch, delta);
    });
}
