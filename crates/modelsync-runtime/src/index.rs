#![forbid(unsafe_code)]

//! The listener index: id → weakly held observers.
//!
//! This is the authoritative subscription table. It is owned by the serial
//! worker and never touched from any other thread; FIFO ordering of the
//! worker's job queue is the only concurrency control it needs.

use std::sync::Arc;

use ahash::AHashMap;
use modelsync_core::{Model, ModelId};

use crate::observer::{ModelObserver, ObserverKey};
use crate::weak_set::WeakSet;

/// Mapping from node id to the observers interested in that id.
pub(crate) struct ListenerIndex<M: Model> {
    buckets: AHashMap<ModelId, WeakSet<dyn ModelObserver<M>>>,
}

impl<M: Model> ListenerIndex<M> {
    pub fn new() -> Self {
        Self {
            buckets: AHashMap::new(),
        }
    }

    /// Add `observer` to `id`'s bucket unless already present by identity.
    pub fn add(&mut self, id: ModelId, observer: &Arc<dyn ModelObserver<M>>) {
        let bucket = self.buckets.entry(id).or_default();
        if !bucket.contains(observer) {
            bucket.append(observer);
        }
    }

    /// Remove the observer with `key` from every bucket it appears in.
    /// Dead slots encountered along the way are dropped too.
    pub fn remove(&mut self, key: ObserverKey) {
        for bucket in self.buckets.values_mut() {
            bucket.retain(|observer| ObserverKey::of(observer) != key);
        }
    }

    /// The live observers for `id`, pruning the bucket in passing.
    pub fn observers_for(&mut self, id: &ModelId) -> Vec<Arc<dyn ModelObserver<M>>> {
        match self.buckets.get_mut(id) {
            Some(bucket) => bucket.prune(),
            None => Vec::new(),
        }
    }

    /// Prune every bucket and drop the ones left empty.
    pub fn prune_all(&mut self) {
        self.buckets.retain(|_, bucket| {
            bucket.prune();
            !bucket.is_empty()
        });
    }

    /// Number of slots (live or dead) in `id`'s bucket.
    #[cfg(test)]
    pub fn bucket_len(&self, id: &ModelId) -> usize {
        self.buckets.get(id).map_or(0, WeakSet::len)
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }
}
