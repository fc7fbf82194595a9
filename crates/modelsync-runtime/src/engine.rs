#![forbid(unsafe_code)]

//! The public engine: configuration, the operation surface, and lifecycle.
//!
//! # Threads
//!
//! A [`SyncEngine`] owns two named threads: the serial worker
//! (`modelsync-worker`) and the pruning timer (`modelsync-gc`). Observer
//! callbacks never run on either — they run on the
//! [`DeliveryScheduler`] supplied at construction.
//!
//! # Thread affinity
//!
//! `subscribe`, `publish`, `delete`, `unsubscribe`, and `clean_memory` are
//! safe from any thread and return immediately; the work is queued.
//! `pause`, `resume`, `is_paused`, and `set_gc_interval` must be called on
//! the delivery queue — they touch state that queue owns. `flush` must
//! *not* be called on the delivery queue (it would wait on itself).

use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use modelsync_core::Model;

use crate::delegate::{CriticalError, EngineDelegate};
use crate::observer::{Context, ModelObserver, ObserverKey};
use crate::sched::DeliveryScheduler;
use crate::worker::{EngineShared, Job, WorkerHandle, lock};

/// Period between pruning ticks unless configured otherwise.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(300);

// ─── GC timer ────────────────────────────────────────────────────────────

enum GcCtl {
    SetPeriod(Duration),
    Shutdown,
}

/// Periodic tick source for `clean_memory`, on its own thread.
///
/// A zero period parks the thread until the period changes or the timer is
/// shut down.
struct GcTimer {
    tx: mpsc::Sender<GcCtl>,
    handle: Option<JoinHandle<()>>,
}

impl GcTimer {
    fn spawn(period: Duration, tick: impl Fn() + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("modelsync-gc".into())
            .spawn(move || gc_loop(&rx, period, &tick))
            .expect("failed to spawn modelsync gc thread");
        Self {
            tx,
            handle: Some(handle),
        }
    }

    fn set_period(&self, period: Duration) {
        let _ = self.tx.send(GcCtl::SetPeriod(period));
    }

    fn shutdown(&mut self) {
        let _ = self.tx.send(GcCtl::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GcTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn gc_loop(rx: &mpsc::Receiver<GcCtl>, mut period: Duration, tick: &dyn Fn()) {
    tracing::debug!(?period, "gc timer started");
    loop {
        if period.is_zero() {
            match rx.recv() {
                Ok(GcCtl::SetPeriod(next)) => period = next,
                Ok(GcCtl::Shutdown) | Err(_) => break,
            }
        } else {
            match rx.recv_timeout(period) {
                Err(mpsc::RecvTimeoutError::Timeout) => tick(),
                Ok(GcCtl::SetPeriod(next)) => period = next,
                Ok(GcCtl::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }
    tracing::debug!("gc timer stopped");
}

// ─── Builder ─────────────────────────────────────────────────────────────

/// Configuration for a [`SyncEngine`].
pub struct EngineBuilder<M: Model> {
    scheduler: Arc<dyn DeliveryScheduler>,
    gc_interval: Duration,
    delegate: Option<Weak<dyn EngineDelegate<M>>>,
}

impl<M: Model> EngineBuilder<M> {
    /// Period between pruning ticks; [`Duration::ZERO`] disables the timer
    /// (pruning still runs on [`SyncEngine::clean_memory`] and
    /// opportunistically).
    #[must_use]
    pub fn gc_interval(mut self, period: Duration) -> Self {
        self.gc_interval = period;
        self
    }

    /// Weakly held sink for replacement hooks and critical errors.
    #[must_use]
    pub fn delegate(mut self, delegate: &Arc<dyn EngineDelegate<M>>) -> Self {
        self.delegate = Some(Arc::downgrade(delegate));
        self
    }

    /// Start the worker and timer threads and hand back the engine.
    #[must_use]
    pub fn build(self) -> SyncEngine<M> {
        let shared = Arc::new(EngineShared::new(self.scheduler, self.delegate));
        let worker = WorkerHandle::spawn(Arc::clone(&shared));
        let tick_tx = worker.sender();
        let gc = GcTimer::spawn(self.gc_interval, move || {
            let _ = tick_tx.send(Job::CleanMemory);
        });
        SyncEngine { shared, worker, gc }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────

/// The model consistency engine.
///
/// Keeps every subscribed observer's tree in sync with published node
/// replacements and deletions. See the crate docs for the full model.
pub struct SyncEngine<M: Model> {
    shared: Arc<EngineShared<M>>,
    worker: WorkerHandle<M>,
    gc: GcTimer,
}

impl<M: Model> SyncEngine<M> {
    /// An engine with default configuration on `scheduler`.
    #[must_use]
    pub fn new(scheduler: Arc<dyn DeliveryScheduler>) -> Self {
        Self::builder(scheduler).build()
    }

    /// Start configuring an engine delivering through `scheduler`.
    #[must_use]
    pub fn builder(scheduler: Arc<dyn DeliveryScheduler>) -> EngineBuilder<M> {
        EngineBuilder {
            scheduler,
            gc_interval: DEFAULT_GC_INTERVAL,
            delegate: None,
        }
    }

    /// Register `observer` for every identified node reachable from its
    /// current root.
    ///
    /// The root is snapshotted on the delivery queue; an observer whose
    /// `current_model()` is `None` at that point registers nothing.
    /// Idempotent: re-subscribing never enlarges a bucket.
    pub fn subscribe(&self, observer: &Arc<dyn ModelObserver<M>>) {
        let weak = Arc::downgrade(observer);
        let tx = self.worker.sender();
        self.shared.scheduler.post(Box::new(move || {
            let Some(observer) = weak.upgrade() else { return };
            let Some(root) = observer.current_model() else {
                return;
            };
            let _ = tx.send(Job::Subscribe {
                observer: Arc::downgrade(&observer),
                root,
            });
        }));
    }

    /// Like [`subscribe`](Self::subscribe), but registers against `root`
    /// instead of snapshotting `observer.current_model()`.
    pub fn subscribe_with_root(&self, observer: &Arc<dyn ModelObserver<M>>, root: M) {
        self.worker.send(Job::Subscribe {
            observer: Arc::downgrade(observer),
            root,
        });
    }

    /// Publish a new version of a subtree.
    ///
    /// Every identified node in `model` becomes a replacement; every
    /// observer whose tree contains any of those ids receives a rewritten
    /// root and a delta on the delivery queue.
    pub fn publish(&self, model: M, context: Option<Context>) {
        self.worker.send(Job::Publish {
            root: model,
            context,
        });
    }

    /// Delete the node identified by `model` from every observer's tree.
    ///
    /// Parents that require the deleted node cascade away too. A model
    /// without identity is a contract violation, reported via the
    /// delegate.
    pub fn delete(&self, model: &M, context: Option<Context>) {
        match model.identity() {
            Some(id) => self.worker.send(Job::Delete { id, context }),
            None => self.shared.report_critical(CriticalError::DeleteMissingIdentity),
        }
    }

    /// Remove `observer` from the pause table and from every index bucket.
    ///
    /// Safe to call during observer teardown; unknown observers are a
    /// no-op. Each structure is scrubbed on the thread that owns it.
    pub fn unsubscribe(&self, observer: &Arc<dyn ModelObserver<M>>) {
        let key = ObserverKey::of(observer);
        let shared = Arc::clone(&self.shared);
        self.shared.scheduler.post(Box::new(move || {
            lock(&shared.pause).remove(key);
        }));
        self.worker.send(Job::Unsubscribe { key });
    }

    /// Buffer updates for `observer` instead of delivering them.
    ///
    /// Delivery-queue only. Idempotent; pausing does not interrupt an
    /// update already past its snapshot.
    pub fn pause(&self, observer: &Arc<dyn ModelObserver<M>>) {
        lock(&self.shared.pause).pause(observer);
    }

    /// Stop buffering and deliver the accumulated delta, reconciled
    /// against the observer's actual current tree.
    ///
    /// Delivery-queue only. No-op when the observer is not paused, when
    /// nothing accumulated, when the observer detached, or when the
    /// buffered tree already equals what the observer shows.
    pub fn resume(&self, observer: &Arc<dyn ModelObserver<M>>) {
        let key = ObserverKey::of(observer);
        let Some(entry) = lock(&self.shared.pause).take(key) else {
            return;
        };
        if entry.delta.is_empty() {
            return;
        }
        let Some(outdated) = observer.current_model() else {
            return;
        };
        if let Some(buffered) = &entry.root
            && buffered.semantic_eq(&outdated)
        {
            return;
        }
        self.worker.send(Job::Reconcile {
            observer: Arc::downgrade(observer),
            root: entry.root,
            delta: entry.delta,
            context: entry.context,
            outdated,
        });
    }

    /// Whether `observer` is currently buffering. Delivery-queue only.
    #[must_use]
    pub fn is_paused(&self, observer: &Arc<dyn ModelObserver<M>>) -> bool {
        lock(&self.shared.pause).is_paused(ObserverKey::of(observer))
    }

    /// Prune dead weak handles everywhere: index buckets (dropping empty
    /// ones) and pause entries. Also the memory-pressure entry point.
    pub fn clean_memory(&self) {
        self.worker.send(Job::CleanMemory);
    }

    /// Block until everything enqueued before this call — including its
    /// deliveries — has drained. Must not be called on the delivery queue.
    pub fn flush(&self) {
        let (tx, rx) = mpsc::channel();
        self.worker.send(Job::Barrier(tx));
        let _ = rx.recv();
    }

    /// Replace the delegate. The engine holds it weakly.
    pub fn set_delegate(&self, delegate: &Arc<dyn EngineDelegate<M>>) {
        *lock(&self.shared.delegate) = Some(Arc::downgrade(delegate));
    }

    /// Change the pruning period. [`Duration::ZERO`] disables the timer.
    /// Delivery-queue only.
    pub fn set_gc_interval(&self, period: Duration) {
        self.gc.set_period(period);
    }

    /// Stop both threads and join them. `Drop` does the same best-effort.
    pub fn shutdown(mut self) {
        self.gc.shutdown();
        self.worker.shutdown();
    }
}
