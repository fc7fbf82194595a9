#![forbid(unsafe_code)]

//! The serial worker: one named thread draining a FIFO job queue.
//!
//! Every listener-index mutation and every rewrite happens here. Serial
//! ordering is the sole concurrency control for the index — the thread owns
//! it outright, no locks. A single update runs in three legs:
//!
//! 1. a blocking hop to the delivery queue to snapshot each affected
//!    observer's current root (buffered root for paused observers),
//! 2. the rewrite of each snapshot against the patch, here on the worker,
//! 3. an async hop to the delivery queue where results are merged into the
//!    pause table or handed to `on_model_updated`.
//!
//! Between legs 1 and 3 an observer may move on; the identity re-check in
//! leg 3 drops deliveries a newer publish has superseded.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};

use ahash::AHashSet;
use modelsync_core::{
    Delta, Model, ModelId, Patch, RewriteOutcome, collect_ids, flatten_by_id, rewrite,
};

use crate::delegate::{CriticalError, EngineDelegate};
use crate::index::ListenerIndex;
use crate::observer::{Context, ModelObserver, ObserverKey};
use crate::pause::PauseTable;
use crate::sched::{DeliveryScheduler, run_blocking};
use crate::stats;

/// Lock a mutex, shrugging off poisoning: the guarded structures hold plain
/// data, so a panicked delivery task cannot leave them logically torn.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the engine handle, the worker, and delivery tasks.
pub(crate) struct EngineShared<M: Model> {
    pub scheduler: Arc<dyn DeliveryScheduler>,
    pub pause: Mutex<PauseTable<M>>,
    pub delegate: Mutex<Option<Weak<dyn EngineDelegate<M>>>>,
}

impl<M: Model> EngineShared<M> {
    pub fn new(
        scheduler: Arc<dyn DeliveryScheduler>,
        delegate: Option<Weak<dyn EngineDelegate<M>>>,
    ) -> Self {
        Self {
            scheduler,
            pause: Mutex::new(PauseTable::new()),
            delegate: Mutex::new(delegate),
        }
    }

    /// The delegate, if one is set and still alive.
    pub fn delegate(&self) -> Option<Arc<dyn EngineDelegate<M>>> {
        lock(&self.delegate).as_ref().and_then(Weak::upgrade)
    }

    /// Report a contract violation through the delegate, on the delivery
    /// queue.
    pub fn report_critical(self: &Arc<Self>, error: CriticalError) {
        tracing::warn!(%error, "critical error");
        stats::record_critical_error();
        let shared = Arc::clone(self);
        self.scheduler.post(Box::new(move || {
            if let Some(delegate) = shared.delegate() {
                delegate.critical_error(error);
            }
        }));
    }
}

/// Work items for the serial worker.
pub(crate) enum Job<M: Model> {
    Subscribe {
        observer: Weak<dyn ModelObserver<M>>,
        root: M,
    },
    Publish {
        root: M,
        context: Option<Context>,
    },
    Delete {
        id: ModelId,
        context: Option<Context>,
    },
    Unsubscribe {
        key: ObserverKey,
    },
    Reconcile {
        observer: Weak<dyn ModelObserver<M>>,
        root: Option<M>,
        delta: Delta,
        context: Option<Context>,
        outdated: M,
    },
    CleanMemory,
    /// Round-trip marker: acknowledged from the delivery queue once every
    /// job ahead of it (and that job's deliveries) has drained.
    Barrier(mpsc::Sender<()>),
    Shutdown,
}

/// Handle to the running worker thread.
pub(crate) struct WorkerHandle<M: Model> {
    tx: mpsc::Sender<Job<M>>,
    handle: Option<JoinHandle<()>>,
}

impl<M: Model> WorkerHandle<M> {
    /// Spawn the worker. The listener index is created inside the thread
    /// and never leaves it.
    pub fn spawn(shared: Arc<EngineShared<M>>) -> Self {
        let (tx, rx) = mpsc::channel::<Job<M>>();
        let handle = thread::Builder::new()
            .name("modelsync-worker".into())
            .spawn(move || worker_loop(&rx, &shared))
            .expect("failed to spawn modelsync worker thread");
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Enqueue a job. After shutdown this is a silent no-op.
    pub fn send(&self, job: Job<M>) {
        if self.tx.send(job).is_err() {
            tracing::trace!("worker gone; job dropped");
        }
    }

    /// A clonable sender for timers and scheduler-side tasks.
    pub fn sender(&self) -> mpsc::Sender<Job<M>> {
        self.tx.clone()
    }

    /// Stop the worker and join it. Idempotent.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<M: Model> Drop for WorkerHandle<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Worker loop ─────────────────────────────────────────────────────────

fn worker_loop<M: Model>(rx: &mpsc::Receiver<Job<M>>, shared: &Arc<EngineShared<M>>) {
    tracing::debug!("worker started");
    let mut index = ListenerIndex::<M>::new();

    while let Ok(job) = rx.recv() {
        match job {
            Job::Subscribe { observer, root } => {
                if let Some(observer) = observer.upgrade() {
                    for id in collect_ids(&root) {
                        index.add(id, &observer);
                    }
                }
            }
            Job::Publish { root, context } => {
                stats::record_publish();
                let patch = Patch::from_tree(&root);
                let observers = gather(&mut index, &patch);
                tracing::trace!(
                    patched = patch.len(),
                    observers = observers.len(),
                    "publish"
                );
                update_observers(&mut index, shared, observers, &patch, context);
            }
            Job::Delete { id, context } => {
                stats::record_publish();
                let observers = index.observers_for(&id);
                tracing::trace!(%id, observers = observers.len(), "delete");
                let patch = Patch::delete_one(id);
                update_observers(&mut index, shared, observers, &patch, context);
            }
            Job::Unsubscribe { key } => {
                index.remove(key);
            }
            Job::Reconcile {
                observer,
                root,
                delta,
                context,
                outdated,
            } => {
                reconcile(shared, observer, root, delta, context, &outdated);
            }
            Job::CleanMemory => {
                index.prune_all();
                tracing::debug!(buckets = index.len(), "pruned listener index");
                let shared = Arc::clone(shared);
                shared.scheduler.clone().post(Box::new(move || {
                    lock(&shared.pause).remove_dead();
                }));
            }
            Job::Barrier(done) => {
                shared.scheduler.post(Box::new(move || {
                    let _ = done.send(());
                }));
            }
            Job::Shutdown => break,
        }
    }
    tracing::debug!("worker stopped");
}

/// The observers referenced by any id the patch touches, deduplicated by
/// identity in bucket order.
fn gather<M: Model>(
    index: &mut ListenerIndex<M>,
    patch: &Patch<M>,
) -> Vec<Arc<dyn ModelObserver<M>>> {
    let mut seen = AHashSet::new();
    let mut out = Vec::new();
    let ids: Vec<ModelId> = patch.ids().cloned().collect();
    for id in &ids {
        for observer in index.observers_for(id) {
            if seen.insert(ObserverKey::of(&observer)) {
                out.push(observer);
            }
        }
    }
    out
}

/// One observer's rewritten update, en route to the delivery queue.
struct Delivery<M: Model> {
    observer: Weak<dyn ModelObserver<M>>,
    outcome: RewriteOutcome<M>,
}

/// The orchestration core: snapshot → rewrite → deliver.
fn update_observers<M: Model>(
    index: &mut ListenerIndex<M>,
    shared: &Arc<EngineShared<M>>,
    observers: Vec<Arc<dyn ModelObserver<M>>>,
    patch: &Patch<M>,
    context: Option<Context>,
) {
    if observers.is_empty() {
        return;
    }

    // Leg 1: snapshot each observer's root on the delivery queue. Paused
    // observers contribute their buffered root.
    let targets: Vec<Weak<dyn ModelObserver<M>>> =
        observers.iter().map(Arc::downgrade).collect();
    drop(observers);
    let snap_shared = Arc::clone(shared);
    let Some(snapshots) = run_blocking(&*shared.scheduler, move || {
        let pause = lock(&snap_shared.pause);
        targets
            .into_iter()
            .filter_map(|weak| {
                let observer = weak.upgrade()?;
                let key = ObserverKey::of(&observer);
                let root = match pause.buffered_root(key) {
                    Some(buffered) => buffered,
                    None => observer.current_model(),
                };
                Some((weak, root))
            })
            .collect::<Vec<_>>()
    }) else {
        // Delivery queue is gone; nothing can be observed anyway.
        return;
    };

    // Leg 2: rewrite on the worker; index newly introduced subtrees so
    // future updates to their descendants reach this observer.
    let mut deliveries = Vec::new();
    for (weak, root) in snapshots {
        let Some(root) = root else { continue };
        let outcome = rewrite(&root, patch);
        if outcome.delta.is_empty() && !outcome.kind_mismatch {
            continue;
        }
        if !outcome.delta.is_empty()
            && let Some(observer) = weak.upgrade()
        {
            for introduced in &outcome.introduced {
                for id in collect_ids(introduced) {
                    index.add(id, &observer);
                }
            }
        }
        deliveries.push(Delivery {
            observer: weak,
            outcome,
        });
    }
    if deliveries.is_empty() {
        return;
    }

    // Leg 3: deliver on the delivery queue.
    let shared = Arc::clone(shared);
    shared.scheduler.clone().post(Box::new(move || {
        deliver_all(&shared, deliveries, context);
    }));
}

/// Runs on the delivery queue: delegate hooks, pause merging, the identity
/// re-check, and the observer callback itself.
fn deliver_all<M: Model>(
    shared: &Arc<EngineShared<M>>,
    deliveries: Vec<Delivery<M>>,
    context: Option<Context>,
) {
    let delegate = shared.delegate();
    for delivery in deliveries {
        let Some(observer) = delivery.observer.upgrade() else {
            continue;
        };
        let outcome = delivery.outcome;

        if let Some(delegate) = &delegate {
            for (old, new) in &outcome.replacements {
                delegate.will_replace_model(old, new, context.as_ref());
            }
        }
        if outcome.kind_mismatch {
            stats::record_critical_error();
            tracing::warn!(error = %CriticalError::MapKindMismatch, "critical error");
            if let Some(delegate) = &delegate {
                delegate.critical_error(CriticalError::MapKindMismatch);
            }
        }
        if outcome.delta.is_empty() {
            continue;
        }

        let key = ObserverKey::of(&observer);
        {
            let mut pause = lock(&shared.pause);
            if pause.is_paused(key) {
                pause.merge(key, outcome.new_root, outcome.delta, context.clone());
                continue;
            }
        }

        // A live rewritten root must still match the observer's present
        // root; otherwise a newer publish is in flight and supersedes this
        // delivery. Deletions carry no identity to compare and always land.
        if let Some(new_root) = &outcome.new_root {
            let current_id = observer.current_model().and_then(|m| m.identity());
            if current_id != new_root.identity() {
                stats::record_superseded();
                tracing::trace!("delivery superseded; dropped");
                continue;
            }
        }

        stats::record_delivery();
        observer.on_model_updated(outcome.new_root, outcome.delta.normalized(), context.clone());
    }
}

/// Resume-time reconciliation of an accumulated pause delta against the
/// observer's actual (outdated) tree, followed by the merged delivery.
fn reconcile<M: Model>(
    shared: &Arc<EngineShared<M>>,
    observer: Weak<dyn ModelObserver<M>>,
    root: Option<M>,
    mut delta: Delta,
    context: Option<Context>,
    outdated: &M,
) {
    match &root {
        Some(buffered) => {
            // Anything still present in the buffered tree survived.
            for id in collect_ids(buffered) {
                delta.deleted.remove(&id);
            }
            // Anything that ended up equal to what the observer already
            // shows is no net change.
            let buffered_by_id = flatten_by_id(buffered);
            let outdated_by_id = flatten_by_id(outdated);
            delta.changed.retain(|id| {
                match (buffered_by_id.get(id), outdated_by_id.get(id)) {
                    (Some(new_node), Some(old_node)) => !new_node.semantic_eq(old_node),
                    _ => true,
                }
            });
        }
        None => delta.changed.clear(),
    }
    delta.normalize();

    let shared = Arc::clone(shared);
    shared.scheduler.clone().post(Box::new(move || {
        if let Some(observer) = observer.upgrade() {
            stats::record_delivery();
            observer.on_model_updated(root, delta, context);
        }
    }));
}
