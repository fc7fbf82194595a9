#![forbid(unsafe_code)]

//! Buffered state for paused observers.
//!
//! Owned by the delivery queue: every mutation happens inside a task posted
//! to the scheduler or inside one of the delivery-queue-only engine entry
//! points. The worker never touches the table directly — it receives a
//! snapshot of the buffered root copied during the delivery-queue hop.
//!
//! A paused observer keeps its listener-index registrations; publishes keep
//! flowing, but their rewritten roots and deltas accumulate here instead of
//! being delivered.

use std::sync::{Arc, Weak};

use ahash::AHashMap;
use modelsync_core::{Delta, Model};

use crate::observer::{Context, ModelObserver, ObserverKey};

/// What the engine holds for one paused observer.
pub(crate) struct PausedEntry<M: Model> {
    /// Kept so dead entries can be swept without resolving keys.
    pub observer: Weak<dyn ModelObserver<M>>,
    /// The root updates have been applied to since the pause.
    pub root: Option<M>,
    /// Accumulated changes, merged per publish.
    pub delta: Delta,
    /// Context of the most recent buffered publish.
    pub context: Option<Context>,
}

/// Per-observer buffered state, keyed by observer identity.
pub(crate) struct PauseTable<M: Model> {
    entries: AHashMap<ObserverKey, PausedEntry<M>>,
}

impl<M: Model> PauseTable<M> {
    pub fn new() -> Self {
        Self {
            entries: AHashMap::new(),
        }
    }

    /// Begin buffering for `observer`. Idempotent: pausing an already
    /// paused observer changes nothing (the original snapshot stands).
    pub fn pause(&mut self, observer: &Arc<dyn ModelObserver<M>>) {
        let key = ObserverKey::of(observer);
        self.entries.entry(key).or_insert_with(|| PausedEntry {
            observer: Arc::downgrade(observer),
            root: observer.current_model(),
            delta: Delta::new(),
            context: None,
        });
    }

    pub fn is_paused(&self, key: ObserverKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// The buffered root for `key`, if that observer is paused.
    ///
    /// `Some(None)` means "paused, and its tree was deleted while paused".
    pub fn buffered_root(&self, key: ObserverKey) -> Option<Option<M>> {
        self.entries.get(&key).map(|entry| entry.root.clone())
    }

    /// Fold a freshly rewritten update into the buffer.
    pub fn merge(&mut self, key: ObserverKey, new_root: Option<M>, sub: Delta, context: Option<Context>) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.root = new_root;
            entry.delta.merge(sub);
            entry.context = context;
        }
    }

    /// Remove and return the entry for `key`.
    pub fn take(&mut self, key: ObserverKey) -> Option<PausedEntry<M>> {
        self.entries.remove(&key)
    }

    /// Remove the entry for `key`, if any.
    pub fn remove(&mut self, key: ObserverKey) {
        self.entries.remove(&key);
    }

    /// Drop entries whose observer has died.
    pub fn remove_dead(&mut self) {
        self.entries
            .retain(|_, entry| entry.observer.upgrade().is_some());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
