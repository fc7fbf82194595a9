#![forbid(unsafe_code)]

//! Modelsync public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.

pub use modelsync_core::{
    Delta, Model, ModelId, ModelKind, Patch, RewriteOutcome, collect_ids, flatten_by_id,
    rewrite, visit_all,
};
pub use modelsync_runtime::{
    Context, CriticalError, DEFAULT_GC_INTERVAL, DeliveryScheduler, EngineBuilder,
    EngineDelegate, InlineScheduler, MainQueue, MainQueueRunner, ModelObserver, ObserverKey,
    SyncEngine, Task, WeakSet, main_queue, run_blocking, stats,
};

pub mod prelude {
    pub use modelsync_core as core;
    pub use modelsync_runtime as runtime;
}
