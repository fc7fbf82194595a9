#![forbid(unsafe_code)]

//! The modelsync consistency engine.
//!
//! An in-process library that keeps multiple independent observers of a
//! shared, tree-structured domain model in sync. Observers register an
//! interest in a whole model subtree; when a mutation is published, the
//! engine computes, for every affected observer, a freshly rebuilt subtree
//! plus a delta of changed and deleted node ids, and delivers that on the
//! embedder's delivery queue.
//!
//! # Architecture
//!
//! - A **serial worker thread** owns the listener index (id → weakly held
//!   observers) and runs every rewrite. FIFO job ordering is the only
//!   concurrency control it needs.
//! - The **delivery queue** — a [`DeliveryScheduler`] supplied by the
//!   embedder, typically the UI event loop — owns the pause table and runs
//!   every observer-visible callback.
//! - Observers and the delegate are held weakly; a dropped observer simply
//!   stops receiving updates and its slots are pruned lazily (periodic
//!   timer, memory-pressure hook, opportunistic compaction).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use modelsync_runtime::{SyncEngine, main_queue};
//!
//! let (queue, runner) = main_queue();
//! let engine = SyncEngine::<MyNode>::new(queue);
//!
//! let observer: Arc<dyn modelsync_runtime::ModelObserver<MyNode>> = my_observer;
//! engine.subscribe(&observer);
//! engine.publish(updated_subtree, None);
//!
//! // On the application main thread:
//! runner.drain();
//! ```

pub mod delegate;
pub mod engine;
pub(crate) mod index;
pub mod observer;
pub(crate) mod pause;
pub mod sched;
pub mod stats;
pub mod weak_set;
pub(crate) mod worker;

pub use delegate::{CriticalError, EngineDelegate};
pub use engine::{DEFAULT_GC_INTERVAL, EngineBuilder, SyncEngine};
pub use observer::{Context, ModelObserver, ObserverKey};
pub use sched::{
    DeliveryScheduler, InlineScheduler, MainQueue, MainQueueRunner, Task, main_queue,
    run_blocking,
};
pub use weak_set::WeakSet;
