//! Shared harness for the engine e2e suites: a tree model, a recording
//! observer, and a pumped delivery queue standing in for an application
//! main thread.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use modelsync_core::{Delta, Model, ModelId, ModelKind};
use modelsync_runtime::{Context, MainQueue, ModelObserver, main_queue, run_blocking};

// ── Test model ──────────────────────────────────────────────────────────

/// `Node(id, payload, children)` with structural equality.
///
/// A `required` child cascades its deletion to the parent.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: Option<ModelId>,
    pub payload: u32,
    pub required: bool,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: &str, payload: u32) -> Self {
        Self {
            id: Some(id.into()),
            payload,
            required: false,
            children: Vec::new(),
        }
    }

    pub fn anonymous(payload: u32) -> Self {
        Self {
            id: None,
            payload,
            required: false,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl Model for Node {
    fn identity(&self) -> Option<ModelId> {
        self.id.clone()
    }

    fn for_each_child(&self, visit: &mut dyn FnMut(&Self)) {
        for child in &self.children {
            visit(child);
        }
    }

    fn semantic_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn map_children(&self, f: &mut dyn FnMut(&Self) -> Option<Self>) -> Option<Self> {
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match f(child) {
                Some(mapped) => children.push(mapped),
                None if child.required => return None,
                None => {}
            }
        }
        Some(Self {
            children,
            ..self.clone()
        })
    }

    fn kind(&self) -> ModelKind {
        ModelKind::named("node")
    }
}

// ── Recording observer ──────────────────────────────────────────────────

/// One delivered update.
#[derive(Clone, Debug)]
pub struct Received {
    pub new_root: Option<Node>,
    pub delta: Delta,
    pub context: Option<u32>,
}

/// An observer that applies each delivery to its root and records it.
pub struct Recorder {
    root: Mutex<Option<Node>>,
    received: Mutex<Vec<Received>>,
}

impl Recorder {
    pub fn watching(root: Node) -> Arc<Recorder> {
        Arc::new(Self {
            root: Mutex::new(Some(root)),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn as_observer(self: &Arc<Self>) -> Arc<dyn ModelObserver<Node>> {
        Arc::clone(self) as Arc<dyn ModelObserver<Node>>
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn root(&self) -> Option<Node> {
        self.root.lock().unwrap().clone()
    }
}

impl ModelObserver<Node> for Recorder {
    fn current_model(&self) -> Option<Node> {
        self.root.lock().unwrap().clone()
    }

    fn on_model_updated(&self, new_root: Option<Node>, delta: Delta, context: Option<Context>) {
        *self.root.lock().unwrap() = new_root.clone();
        let context = context
            .as_ref()
            .and_then(|c| c.downcast_ref::<u32>())
            .copied();
        self.received.lock().unwrap().push(Received {
            new_root,
            delta,
            context,
        });
    }
}

// ── Pumped main loop ────────────────────────────────────────────────────

/// A dedicated thread pumping a [`MainQueue`] — the test's "main thread".
///
/// Drop order matters: shut the engine down (releasing its scheduler
/// handle) before calling [`join`](MainLoop::join), or the pump never
/// observes disconnection.
pub struct MainLoop {
    queue: Option<Arc<MainQueue>>,
    pump: Option<JoinHandle<()>>,
}

impl MainLoop {
    pub fn start() -> Self {
        let (queue, runner) = main_queue();
        let pump = thread::Builder::new()
            .name("test-main".into())
            .spawn(move || runner.run())
            .expect("failed to spawn test main loop");
        Self {
            queue: Some(queue),
            pump: Some(pump),
        }
    }

    pub fn scheduler(&self) -> Arc<MainQueue> {
        Arc::clone(self.queue.as_ref().expect("main loop running"))
    }

    /// Run `f` on the main loop and wait for its result.
    pub fn call<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let queue = self.queue.as_ref().expect("main loop running");
        run_blocking(&**queue, f).expect("main loop alive")
    }

    /// Release this handle's queue reference and join the pump thread.
    pub fn join(mut self) {
        self.queue = None;
        if let Some(pump) = self.pump.take() {
            pump.join().expect("main loop exits cleanly");
        }
    }
}

impl Drop for MainLoop {
    fn drop(&mut self) {
        self.queue = None;
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
    }
}

// ── Assertion helpers ───────────────────────────────────────────────────

/// Assert a delta's contents by id text.
pub fn assert_delta(delta: &Delta, changed: &[&str], deleted: &[&str]) {
    let mut got_changed: Vec<&str> = delta.changed.iter().map(ModelId::as_str).collect();
    let mut got_deleted: Vec<&str> = delta.deleted.iter().map(ModelId::as_str).collect();
    got_changed.sort_unstable();
    got_deleted.sort_unstable();
    let mut want_changed = changed.to_vec();
    let mut want_deleted = deleted.to_vec();
    want_changed.sort_unstable();
    want_deleted.sort_unstable();
    assert_eq!(got_changed, want_changed, "changed set mismatch");
    assert_eq!(got_deleted, want_deleted, "deleted set mismatch");
}
