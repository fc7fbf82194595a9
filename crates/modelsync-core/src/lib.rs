#![forbid(unsafe_code)]

//! Data layer for the modelsync consistency engine.
//!
//! This crate is pure: no threads, no I/O, no callbacks into host code
//! beyond the [`Model`] capability itself. It defines:
//!
//! - [`ModelId`]: the opaque key identifying an addressable tree node.
//! - [`Model`]: the capability a host node type must satisfy (identity,
//!   child enumeration, semantic equality, child-mapping with cascading
//!   delete, and a kind tag).
//! - [`Delta`]: the disjoint changed/deleted id-sets delivered alongside a
//!   rebuilt tree.
//! - [`Patch`]: a set of whole-node replacements and deletions keyed by id.
//! - [`walk`]: pre-order traversal and id flattening.
//! - [`rewrite`]: the recursive rewrite that propagates a patch through a
//!   tree, producing a new root, a delta, and the newly introduced
//!   subtrees.
//!
//! The runtime crate layers scheduling, weak observer bookkeeping, and the
//! public engine API on top.

pub mod delta;
pub mod id;
pub mod model;
pub mod patch;
pub mod rewrite;
pub mod walk;

pub use delta::Delta;
pub use id::ModelId;
pub use model::{Model, ModelKind};
pub use patch::Patch;
pub use rewrite::{RewriteOutcome, rewrite};
pub use walk::{collect_ids, flatten_by_id, visit_all};
