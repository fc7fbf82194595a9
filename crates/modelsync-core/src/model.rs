#![forbid(unsafe_code)]

//! The model capability: what the engine requires of a host node type.
//!
//! The engine never stores model trees of its own; it borrows immutable
//! snapshots from observers, rewrites them, and hands new snapshots back.
//! Everything it needs from a node fits in five operations, and all of them
//! must be pure.
//!
//! # Contract
//!
//! 1. `identity()` is stable for a given node value.
//! 2. `for_each_child` enumerates direct children in a stable, structurally
//!    meaningful order.
//! 3. `semantic_eq` is an equivalence over payload and (recursively)
//!    children.
//! 4. `map_children` preserves identity, payload, and kind; only children
//!    may differ. Deleting a child the node requires deletes the node
//!    (cascading delete).
//! 5. `kind()` of the `map_children` result equals `kind()` of the
//!    receiver. Violations are surfaced to the engine delegate as a
//!    critical error, not a panic.

use crate::id::ModelId;

/// Dynamic kind tag of a model node.
///
/// Single-struct model types can rely on the default (the type name).
/// Multi-variant model types should override [`Model::kind`] per variant so
/// the engine can detect a `map_children` implementation that swaps kinds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ModelKind(&'static str);

impl ModelKind {
    /// A kind tag with an explicit name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    /// The kind tag of a Rust type.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>())
    }

    /// The tag's textual form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

/// A node in an observer's tree.
///
/// Values are treated as immutable snapshots; a rewrite always yields a new
/// value, never mutates in place. `Clone` is expected to be cheap (shared
/// structure or small payloads).
pub trait Model: Clone + Send + Sync + 'static {
    /// The node's identity, if it is addressable by updates.
    ///
    /// Nodes without identity participate in structure (they are traversed
    /// and mapped) but cannot be targeted by a patch and never appear in a
    /// delta.
    fn identity(&self) -> Option<ModelId>;

    /// Enumerate direct children in stable order.
    fn for_each_child(&self, visit: &mut dyn FnMut(&Self));

    /// Semantic equality over the node's payload and, recursively, its
    /// children.
    fn semantic_eq(&self, other: &Self) -> bool;

    /// Produce a new node of the same kind whose children are `f(child)`.
    ///
    /// `f` returning `None` deletes that child. If a deleted child is one
    /// the node requires, the node itself must return `None` so the delete
    /// cascades upward. The result keeps the receiver's identity and
    /// payload; only children may differ.
    fn map_children(&self, f: &mut dyn FnMut(&Self) -> Option<Self>) -> Option<Self>;

    /// The node's dynamic kind tag.
    fn kind(&self) -> ModelKind {
        ModelKind::of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestNode;

    #[test]
    fn default_kind_is_type_name() {
        #[derive(Clone)]
        struct Leaf;
        impl Model for Leaf {
            fn identity(&self) -> Option<ModelId> {
                None
            }
            fn for_each_child(&self, _visit: &mut dyn FnMut(&Self)) {}
            fn semantic_eq(&self, _other: &Self) -> bool {
                true
            }
            fn map_children(&self, _f: &mut dyn FnMut(&Self) -> Option<Self>) -> Option<Self> {
                Some(Leaf)
            }
        }

        assert!(Leaf.kind().name().ends_with("Leaf"));
        assert_eq!(Leaf.kind(), Leaf.kind());
    }

    #[test]
    fn named_kinds_compare_by_name() {
        assert_eq!(ModelKind::named("a"), ModelKind::named("a"));
        assert_ne!(ModelKind::named("a"), ModelKind::named("b"));
    }

    #[test]
    fn map_children_cascades_on_required_child() {
        let root = TestNode::new("a", 0)
            .with_children(vec![TestNode::new("b", 1).required(), TestNode::new("c", 2)]);

        // Deleting the optional child keeps the node.
        let kept = root.map_children(&mut |child| {
            if child.id == Some("c".into()) {
                None
            } else {
                Some(child.clone())
            }
        });
        let kept = kept.expect("optional delete must not cascade");
        assert_eq!(kept.children.len(), 1);

        // Deleting the required child cascades.
        let gone = root.map_children(&mut |child| {
            if child.id == Some("b".into()) {
                None
            } else {
                Some(child.clone())
            }
        });
        assert!(gone.is_none());
    }

    #[test]
    fn map_children_preserves_identity_and_payload() {
        let root = TestNode::new("a", 7).with_children(vec![TestNode::new("b", 1)]);
        let mapped = root
            .map_children(&mut |child| Some(child.clone()))
            .expect("no deletions");
        assert_eq!(mapped.id, root.id);
        assert_eq!(mapped.payload, root.payload);
        assert!(mapped.semantic_eq(&root));
    }
}
