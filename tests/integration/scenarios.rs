//! End-to-end event scenarios

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clusterwatch::drift;
use clusterwatch::{ClusterState, Event, Observers, TaskState};
use serde_json::json;
use serial_test::serial;

use super::helpers::{bounded_state, capture_drift, task_event, uuids, worker_event};

#[test]
fn test_out_of_order_transitions_keep_final_state() {
    let state = ClusterState::new();
    state
        .event(&task_event("succeeded", "u", "h", 3, 3.0))
        .expect("succeeded");
    state
        .event(
            &task_event("received", "u", "h", 1, 1.0)
                .with("name", "myt")
                .with("args", json!([1])),
        )
        .expect("received");

    let task = state.task("u").expect("task tracked");
    assert_eq!(task.state, TaskState::Success);
    assert_eq!(task.timestamp, Some(3.0));
    assert_eq!(task.name.as_deref(), Some("myt"));
    assert_eq!(task.args, Some(json!([1])));
    assert_eq!(task.received, Some(1.0));
    assert_eq!(state.task_types(), vec!["myt"]);
}

#[test]
fn test_retry_does_not_regress() {
    let state = ClusterState::new();
    for (clock, subject) in ["received", "started", "retried", "succeeded"]
        .into_iter()
        .enumerate()
    {
        let clock = clock as u64 + 1;
        state
            .event(&task_event(subject, "u", "h", clock, clock as f64))
            .expect("event");
    }

    let task = state.task("u").expect("task tracked");
    assert_eq!(task.state, TaskState::Success);
    assert_eq!(task.retried, Some(3.0));
    assert_eq!(task.succeeded, Some(4.0));
    assert!(task.ready());
}

#[test]
fn test_heartbeats_keep_the_newest_four() {
    let state = ClusterState::new();
    for ts in 1..=5 {
        state
            .event(&worker_event("heartbeat", "h1", f64::from(ts)))
            .expect("heartbeat");
    }

    let worker = state.worker("h1").expect("worker tracked");
    assert_eq!(worker.heartbeats, vec![2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_offline_with_leave_observer_removes_worker() {
    let left = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&left);
    let state = ClusterState::new().with_observers(Observers::new().on_node_leave(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    state.event(&worker_event("online", "h1", 10.0)).expect("online");
    state.event(&worker_event("offline", "h1", 20.0)).expect("offline");

    assert!(state.worker("h1").is_none());
    assert!(state.workers().is_empty());
    assert_eq!(left.load(Ordering::SeqCst), 1);
}

#[test]
fn test_heap_cap_and_surviving_tasks() {
    let state = bounded_state(10, 2, 2);
    let ids: Vec<String> = (0..6).map(|_| uuid::Uuid::new_v4().to_string()).collect();
    for (clock, uuid) in ids.iter().enumerate() {
        let clock = clock as u64 + 1;
        state
            .event(&task_event("received", uuid, "h1", clock, clock as f64))
            .expect("event");
    }

    assert_eq!(state.heap_len(), 4);
    assert_eq!(state.tracked_task_count(), 2);
    assert_eq!(uuids(&state.tasks_by_time(None)), vec![ids[5].clone(), ids[4].clone()]);
    assert_eq!(state.task_count(), 6);
}

#[test]
#[serial]
fn test_drift_warning_is_deduplicated() {
    let captured = capture_drift();
    let state = ClusterState::new();

    for i in 0..10 {
        let ts = 1000.0 + f64::from(i);
        let event = Event::new("worker-heartbeat")
            .with("hostname", "h1")
            .with("timestamp", ts)
            .with("local_received", ts + 100.0);
        state.event(&event).expect("heartbeat");
    }

    {
        let warnings = captured.lock();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].hostname, "h1");
        assert_eq!(warnings[0].drift, 100.0);
    }
    drift::reset();
}
