#![forbid(unsafe_code)]

//! The observer capability and observer identity.

use std::any::Any;
use std::sync::Arc;

use modelsync_core::{Delta, Model};

/// Opaque payload threaded from a publish or delete through to delivery.
pub type Context = Arc<dyn Any + Send + Sync>;

/// An entity that owns a current root model and receives deltas.
///
/// Both methods run only on the delivery queue (the scheduler handed to the
/// engine at construction). Observers are held weakly by the engine; an
/// observer dropped by its external holder simply stops receiving updates.
pub trait ModelObserver<M: Model>: Send + Sync {
    /// The presently displayed root, or `None` once the observer has
    /// detached from its tree.
    fn current_model(&self) -> Option<M>;

    /// A rewritten tree is ready.
    ///
    /// `new_root` is `None` when the observed tree was deleted. `delta`
    /// satisfies `changed ∩ deleted = ∅`. `context` is whatever the
    /// publisher supplied.
    fn on_model_updated(&self, new_root: Option<M>, delta: Delta, context: Option<Context>);
}

/// Identity of an observer: the address of its allocation.
///
/// Used as the pause-table key and for unsubscribe bucket scrubbing. The
/// key of a dropped observer may be reused by a later allocation, which is
/// harmless: every structure keyed by it also holds the weak handle and
/// checks liveness at the moment of use.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObserverKey(usize);

impl ObserverKey {
    /// The key for `observer`.
    #[must_use]
    pub fn of<M: Model>(observer: &Arc<dyn ModelObserver<M>>) -> Self {
        Self(Arc::as_ptr(observer).cast::<u8>() as usize)
    }
}
