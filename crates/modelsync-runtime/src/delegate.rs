#![forbid(unsafe_code)]

//! The engine delegate: replacement hooks and critical-error reporting.

use modelsync_core::Model;
use thiserror::Error;

use crate::observer::Context;

/// Contract violations the engine reports instead of panicking.
///
/// A critical error means the caller's [`Model`] implementation (or a call
/// into the engine) broke its contract. The engine reports it once, through
/// the delegate on the delivery queue, and keeps operating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CriticalError {
    /// `delete` was called with a model that has no identity.
    #[error("delete requires a model with an identity")]
    DeleteMissingIdentity,

    /// A model's `map_children` returned a node of a different kind than
    /// its receiver.
    #[error("map_children returned a node of a different kind")]
    MapKindMismatch,
}

/// Weakly-held sink for engine notifications.
///
/// All methods have empty default bodies and run on the delivery queue.
pub trait EngineDelegate<M: Model>: Send + Sync {
    /// An observer's node `old` is about to be replaced by `new` as part of
    /// a delivered update.
    fn will_replace_model(&self, _old: &M, _new: &M, _context: Option<&Context>) {}

    /// A caller-contract violation was detected. Not retried.
    fn critical_error(&self, _error: CriticalError) {}
}
