//! E2E tests for the pause/resume protocol: buffering, merge accumulation,
//! resume-time reconciliation, and teardown while paused.

mod common;

use std::sync::Arc;
use std::time::Duration;

use modelsync_runtime::{ModelObserver, SyncEngine};

use common::{MainLoop, Node, Recorder, assert_delta};

type Observer = Arc<dyn ModelObserver<Node>>;

fn engine_on(main: &MainLoop) -> Arc<SyncEngine<Node>> {
    Arc::new(
        SyncEngine::builder(main.scheduler())
            .gc_interval(Duration::ZERO)
            .build(),
    )
}

/// `A(1, [B(2), C(3)])`
fn watched_tree() -> Node {
    Node::new("1", 10).with_children(vec![Node::new("2", 20), Node::new("3", 30)])
}

// pause/resume/is_paused are delivery-queue-only, so every call hops onto
// the pumped main loop.

fn pause(main: &MainLoop, engine: &Arc<SyncEngine<Node>>, observer: &Observer) {
    let engine = Arc::clone(engine);
    let observer = observer.clone();
    main.call(move || engine.pause(&observer));
}

fn resume(main: &MainLoop, engine: &Arc<SyncEngine<Node>>, observer: &Observer) {
    let engine = Arc::clone(engine);
    let observer = observer.clone();
    main.call(move || engine.resume(&observer));
}

fn is_paused(main: &MainLoop, engine: &Arc<SyncEngine<Node>>, observer: &Observer) -> bool {
    let engine = Arc::clone(engine);
    let observer = observer.clone();
    main.call(move || engine.is_paused(&observer))
}

#[test]
fn paused_observer_receives_nothing_until_resume() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    assert!(is_paused(&main, &engine, &observer));

    engine.publish(Node::new("2", 21), None);
    engine.publish(Node::new("3", 31), None);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    resume(&main, &engine, &observer);
    engine.flush();
    assert!(!is_paused(&main, &engine, &observer));

    // One merged delivery carrying the union of both publishes.
    let received = recorder.received();
    assert_eq!(received.len(), 1);
    assert_delta(&received[0].delta, &["1", "2", "3"], &[]);
    let root = received[0].new_root.as_ref().expect("root survives");
    assert_eq!(root.children[0].payload, 21);
    assert_eq!(root.children[1].payload, 31);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn pause_is_idempotent_and_keeps_the_original_snapshot() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    engine.publish(Node::new("2", 21), None);
    engine.flush();

    // Pausing again mid-buffer must not reset the accumulated state.
    pause(&main, &engine, &observer);
    engine.publish(Node::new("3", 31), None);
    engine.flush();

    resume(&main, &engine, &observer);
    engine.flush();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    assert_delta(&received[0].delta, &["1", "2", "3"], &[]);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn delete_while_paused_survives_if_reintroduced() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);

    // Delete C, then republish a root that contains C again (and a changed
    // B). The net effect on C must cancel out.
    engine.delete(&Node::new("3", 30), None);
    engine.publish(
        Node::new("1", 10).with_children(vec![Node::new("2", 21), Node::new("3", 30)]),
        None,
    );
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    resume(&main, &engine, &observer);
    engine.flush();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    // C survived (reintroduced), so it is neither deleted nor changed; B
    // actually changed, and so did the root.
    assert_delta(&received[0].delta, &["1", "2"], &[]);
    let root = received[0].new_root.as_ref().expect("root survives");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.children[1].payload, 30);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn delete_while_paused_sticks_if_not_reintroduced() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    engine.delete(&Node::new("3", 30), None);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    resume(&main, &engine, &observer);
    engine.flush();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    assert_delta(&received[0].delta, &["1"], &["3"]);
    let root = received[0].new_root.as_ref().expect("root survives");
    assert_eq!(root.children.len(), 1);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn resume_without_buffered_changes_delivers_nothing() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    resume(&main, &engine, &observer);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    // Resume of a never-paused observer is equally silent.
    resume(&main, &engine, &observer);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn changed_entries_that_equal_reality_reconcile_away() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);

    // B bounces to 21 and back to 20; C moves for real. At resume time the
    // buffered B equals what the observer already shows, so only C (and
    // the root) survive reconciliation.
    engine.publish(Node::new("2", 21), None);
    engine.publish(Node::new("2", 20), None);
    engine.publish(Node::new("3", 31), None);
    engine.flush();

    resume(&main, &engine, &observer);
    engine.flush();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    assert_delta(&received[0].delta, &["1", "3"], &[]);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn unsubscribe_while_paused_discards_the_buffer() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(watched_tree());
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    engine.publish(Node::new("2", 21), None);
    engine.flush();

    engine.unsubscribe(&observer);
    engine.flush();
    assert!(!is_paused(&main, &engine, &observer));

    // Neither the buffered update nor later publishes arrive.
    resume(&main, &engine, &observer);
    engine.publish(Node::new("3", 31), None);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    drop((observer, recorder, engine));
    main.join();
}

#[test]
fn paused_observer_sees_root_deletion_on_resume() {
    let main = MainLoop::start();
    let engine = engine_on(&main);
    let recorder = Recorder::watching(
        Node::new("1", 10).with_children(vec![Node::new("2", 20).required()]),
    );
    let observer = recorder.as_observer();
    engine.subscribe(&observer);
    engine.flush();

    pause(&main, &engine, &observer);
    engine.delete(&Node::new("2", 20), None);
    engine.flush();
    assert_eq!(recorder.delivery_count(), 0);

    resume(&main, &engine, &observer);
    engine.flush();

    let received = recorder.received();
    assert_eq!(received.len(), 1);
    assert!(received[0].new_root.is_none());
    assert_delta(&received[0].delta, &[], &["1", "2"]);
    assert_eq!(recorder.root(), None);

    drop((observer, recorder, engine));
    main.join();
}
