#![forbid(unsafe_code)]

//! The delivery-queue abstraction.
//!
//! The engine never assumes a platform main thread. Instead the embedder
//! supplies a [`DeliveryScheduler`] — a serial executor on which every
//! observer-visible callback runs (`on_model_updated`, the delegate hooks)
//! and on which the pause table lives. On a desktop app this is the UI
//! event loop; in tests it is a pumped channel or the calling thread.
//!
//! # Contract
//!
//! 1. Tasks run serially, in FIFO order.
//! 2. The scheduler must never block on the engine: the worker performs a
//!    blocking post-and-wait hop ([`run_blocking`]) to snapshot observer
//!    roots, and a scheduler that waits on the worker would deadlock.
//! 3. Tasks may be dropped unrun only when the queue itself is shutting
//!    down; [`run_blocking`] reports that as `None`.

use std::sync::Arc;
use std::sync::mpsc;

/// A unit of work for the delivery queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A serial executor for observer-visible callbacks.
pub trait DeliveryScheduler: Send + Sync + 'static {
    /// Enqueue `task`. Must not run it re-entrantly ahead of earlier tasks.
    fn post(&self, task: Task);
}

/// Post `f` and wait for its result.
///
/// Returns `None` when the queue dropped the task without running it
/// (shutdown). Never call this from the delivery queue itself.
pub fn run_blocking<R, F>(scheduler: &dyn DeliveryScheduler, f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    scheduler.post(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.recv().ok()
}

// ─── Inline scheduler ────────────────────────────────────────────────────

/// Runs every task immediately on the posting thread.
///
/// Suitable for single-threaded embedders where the caller's thread *is*
/// the delivery queue, and for unit tests. Serial ordering holds trivially
/// because each post completes before the next begins.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl DeliveryScheduler for InlineScheduler {
    fn post(&self, task: Task) {
        task();
    }
}

// ─── Pumped main queue ───────────────────────────────────────────────────

/// The sending half of a channel-backed delivery queue.
///
/// Hand this to the engine; pump the paired [`MainQueueRunner`] on the
/// thread that plays the role of the application main thread.
pub struct MainQueue {
    tx: mpsc::Sender<Task>,
}

impl DeliveryScheduler for MainQueue {
    fn post(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::trace!("delivery queue gone; task dropped");
        }
    }
}

/// The pumping half of a [`MainQueue`].
pub struct MainQueueRunner {
    rx: mpsc::Receiver<Task>,
}

impl MainQueueRunner {
    /// Run every currently queued task; returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Run tasks until every [`MainQueue`] handle is dropped.
    pub fn run(&self) {
        while let Ok(task) = self.rx.recv() {
            task();
        }
    }
}

/// A connected queue/runner pair.
#[must_use]
pub fn main_queue() -> (Arc<MainQueue>, MainQueueRunner) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(MainQueue { tx }), MainQueueRunner { rx })
}
