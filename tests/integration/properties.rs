//! Invariants that hold for arbitrary event sequences

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clusterwatch::drift;
use clusterwatch::{
    ClusterState, Event, FixedTimeSource, Observers, StateSnapshot, Task, TaskState,
};
use serde_json::json;
use serial_test::serial;

use super::helpers::{
    bounded_state, capture_drift, permutations, task_event, uuids, worker_event, Shuffler,
};

const LIFECYCLE: [&str; 6] = ["sent", "received", "started", "succeeded", "failed", "revoked"];

/// A mixed stream of worker and task events over a handful of hosts.
fn mixed_events(seed: u64, count: usize, hosts: usize, tasks: usize) -> Vec<Event> {
    let mut rng = Shuffler::new(seed);
    let ids: Vec<String> = (0..tasks).map(|_| uuid::Uuid::new_v4().to_string()).collect();
    (0..count)
        .map(|i| {
            let ts = 1000.0 + rng.below(500) as f64;
            let host = format!("host-{}", rng.below(hosts));
            if rng.below(3) == 0 {
                let subject = ["online", "heartbeat", "heartbeat", "offline"][rng.below(4)];
                worker_event(subject, &host, ts)
            } else {
                let subject = LIFECYCLE[rng.below(LIFECYCLE.len())];
                task_event(subject, &ids[rng.below(tasks)], &host, i as u64, ts)
            }
        })
        .collect()
}

fn is_ascending(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

#[test]
fn test_capacities_are_never_exceeded() {
    let state = bounded_state(3, 5, 2);
    for event in mixed_events(7, 400, 8, 40) {
        state.event(&event).expect("event");
        assert!(state.worker_count() <= 3);
        assert!(state.tracked_task_count() <= 5);
        assert!(state.heap_len() <= 10);
    }
}

#[test]
fn test_heartbeats_stay_bounded_and_sorted() {
    let state = ClusterState::new();
    let mut rng = Shuffler::new(42);
    let mut stamps: Vec<f64> = (0..40).map(|i| 500.0 + f64::from(i)).collect();
    rng.shuffle(&mut stamps);

    for ts in stamps {
        let host = format!("w{}", rng.below(3));
        state.event(&worker_event("heartbeat", &host, ts)).expect("event");
        for worker in state.workers() {
            assert!(worker.heartbeats.len() <= 4);
            assert!(is_ascending(&worker.heartbeats), "{:?}", worker.heartbeats);
        }
    }
}

#[test]
fn test_final_state_is_independent_of_arrival_order() {
    let subjects = ["sent", "received", "started", "succeeded"];
    for (n, order) in permutations(&subjects).into_iter().enumerate() {
        let state = ClusterState::new();
        for subject in &order {
            state
                .event(&task_event(subject, "u", "h", 1, 1.0))
                .expect("event");
        }
        let task = state.task("u").expect("task");
        assert_eq!(task.state, TaskState::Success, "order #{n}: {order:?}");
    }

    let unfinished = ["sent", "received", "started"];
    for order in permutations(&unfinished) {
        let state = ClusterState::new();
        for subject in &order {
            state.event(&task_event(subject, "u", "h", 1, 1.0)).expect("event");
        }
        assert_eq!(state.task("u").expect("task").state, TaskState::Started);
    }
}

#[test]
fn test_retry_alone_yields_retry_and_never_blocks_completion() {
    let state = ClusterState::new();
    state.event(&task_event("retried", "r", "h", 1, 1.0)).expect("event");
    assert_eq!(state.task("r").expect("task").state, TaskState::Retry);

    for order in permutations(&["retried", "started", "succeeded"]) {
        let position = |subject: &str| order.iter().position(|s| *s == subject);
        if position("retried") > position("succeeded") {
            continue;
        }
        let state = ClusterState::new();
        for subject in &order {
            state.event(&task_event(subject, "u", "h", 1, 1.0)).expect("event");
        }
        assert_eq!(state.task("u").expect("task").state, TaskState::Success, "{order:?}");
    }
}

#[test]
fn test_late_received_only_merges_whitelisted_fields() {
    let state = ClusterState::new();
    state
        .event(&task_event("started", "u", "h", 2, 20.0).with("routing_key", "fast"))
        .expect("started");
    state
        .event(
            &task_event("received", "u", "h", 1, 10.0)
                .with("name", "tasks.add")
                .with("args", json!([2, 2]))
                .with("kwargs", json!({"z": 1}))
                .with("retries", 3)
                .with("eta", "2026-01-01T00:00:00")
                .with("expires", "2026-01-02T00:00:00")
                .with("routing_key", "slow")
                .with("result", 4),
        )
        .expect("received");

    let task = state.task("u").expect("task");
    assert_eq!(task.state, TaskState::Started);
    assert_eq!(task.timestamp, Some(20.0));
    assert_eq!(task.clock, 2);
    assert_eq!(task.name.as_deref(), Some("tasks.add"));
    assert_eq!(task.args, Some(json!([2, 2])));
    assert_eq!(task.kwargs, Some(json!({"z": 1})));
    assert_eq!(task.retries, Some(3));
    assert_eq!(task.eta.as_deref(), Some("2026-01-01T00:00:00"));
    assert_eq!(task.expires.as_deref(), Some("2026-01-02T00:00:00"));
    assert_eq!(task.routing_key.as_deref(), Some("fast"));
    assert_eq!(task.result, None);
}

#[test]
fn test_offline_clears_liveness() {
    let clock = Arc::new(FixedTimeSource::new(100.0));

    let plain = ClusterState::new().with_time_source(clock.clone());
    plain.event(&worker_event("online", "h1", 100.0)).expect("online");
    assert_eq!(plain.alive_workers().len(), 1);
    plain.event(&worker_event("offline", "h1", 101.0)).expect("offline");
    let worker = plain.worker("h1").expect("kept without leave observer");
    assert!(worker.heartbeats.is_empty());
    assert!(!worker.alive());
    assert!(plain.alive_workers().is_empty());

    let observed = ClusterState::new()
        .with_observers(Observers::new().on_node_leave(|_| Ok(())))
        .with_time_source(clock);
    observed.event(&worker_event("online", "h1", 100.0)).expect("online");
    observed.event(&worker_event("offline", "h1", 101.0)).expect("offline");
    assert!(observed.worker("h1").is_none());
    assert!(observed.alive_workers().is_empty());
}

#[test]
fn test_counters_match_calls_and_distinct_receipts() {
    let state = ClusterState::new();
    let events = mixed_events(99, 300, 4, 25);
    let mut received = std::collections::HashSet::new();

    for event in &events {
        if event.kind == "task-received" {
            received.insert(event.uuid().map(str::to_string));
        }
        state.event(event).expect("event");
    }
    state.event(&Event::new("unknown")).expect("unhandled");
    state.event(&Event::new("task-received")).expect("dropped");

    assert_eq!(state.event_count(), events.len() as u64 + 2);
    assert_eq!(state.task_count(), received.len() as u64);
    assert_eq!(state.dropped_count(), 1);
}

#[test]
fn test_rebuilt_heap_orders_by_clock() {
    let state = ClusterState::new();
    let mut rng = Shuffler::new(5);
    let mut clocks: Vec<u64> = (1..=30).collect();
    rng.shuffle(&mut clocks);
    for clock in clocks {
        state
            .event(&task_event("received", &format!("t{clock}"), "h", clock, clock as f64))
            .expect("event");
    }

    state.rebuild_taskheap();
    let tasks = state.tasks_by_time(None);
    assert_eq!(tasks.len(), 30);
    assert!(tasks.windows(2).all(|pair| pair[0].clock >= pair[1].clock));

    state.rebuild_taskheap();
    assert_eq!(uuids(&state.tasks_by_time(None)), uuids(&tasks));
}

#[test]
#[serial]
fn test_drift_sink_fires_at_most_once_per_host() {
    let captured = capture_drift();
    let state = ClusterState::new();

    for i in 0..50 {
        let host = format!("drifty-{}", i % 3);
        let ts = 2000.0 + f64::from(i);
        let event = Event::new("task-started")
            .with("uuid", format!("d{i}"))
            .with("hostname", host)
            .with("timestamp", ts)
            .with("local_received", ts - 30.0);
        state.event(&event).expect("event");
    }

    {
        let mut hosts: Vec<String> = captured.lock().iter().map(|w| w.hostname.clone()).collect();
        hosts.sort();
        assert_eq!(hosts, vec!["drifty-0", "drifty-1", "drifty-2"]);
    }
    drift::reset();
}

fn task_infos(tasks: &[Task]) -> Vec<serde_json::Map<String, serde_json::Value>> {
    tasks.iter().map(Task::info).collect()
}

#[test]
fn test_snapshot_round_trip_preserves_queries() {
    let clock = Arc::new(FixedTimeSource::new(1200.0));
    let state = bounded_state(4, 12, 3).with_time_source(clock.clone());
    let mut rng = Shuffler::new(11);
    for i in 0..60u64 {
        let uuid = format!("t{}", rng.below(20));
        let host = format!("h{}", rng.below(5));
        let subject = LIFECYCLE[rng.below(LIFECYCLE.len())];
        let event = task_event(subject, &uuid, &host, i, 1000.0 + i as f64)
            .with("name", format!("job{}", i % 3));
        state.event(&event).expect("event");
    }
    state.event(&worker_event("online", "h9", 1150.0)).expect("event");

    let json = state.snapshot().to_json().expect("encode");
    let joins = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&joins);
    let restored = ClusterState::from_snapshot(
        StateSnapshot::from_json(&json).expect("decode"),
        Observers::new().on_node_join(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )
    .expect("restore")
    .with_time_source(clock);

    assert_eq!(joins.load(Ordering::SeqCst), 0);
    assert_eq!(restored.config(), state.config());
    assert_eq!(restored.event_count(), state.event_count());
    assert_eq!(restored.task_count(), state.task_count());
    let mut names: Vec<String> = state
        .itertasks(None)
        .into_iter()
        .filter_map(|t| t.name)
        .collect();
    names.sort();
    names.dedup();
    assert_eq!(restored.task_types(), names);
    assert_eq!(
        task_infos(&restored.tasks_by_time(None)),
        task_infos(&state.tasks_by_time(None))
    );
    assert_eq!(
        task_infos(&restored.itertasks(None)),
        task_infos(&state.itertasks(None))
    );
    assert_eq!(
        uuids(&restored.tasks_by_type("job1", Some(3))),
        uuids(&state.tasks_by_type("job1", Some(3)))
    );
    assert_eq!(
        uuids(&restored.tasks_by_worker("h1", None)),
        uuids(&state.tasks_by_worker("h1", None))
    );

    let hostnames = |s: &ClusterState| -> Vec<String> {
        s.alive_workers().into_iter().map(|w| w.hostname).collect()
    };
    assert_eq!(hostnames(&restored), hostnames(&state));
    let ids = |s: &ClusterState| -> Vec<String> { s.workers().iter().map(|w| w.id()).collect() };
    assert_eq!(ids(&restored), ids(&state));
}

const CAPPED_EVENTS: [(&str, &str, u64); 3] =
    [("received", "a", 1), ("received", "b", 2), ("started", "b", 3)];

/// Feed `(subject, uuid, clock)` task events from one host, timestamped by clock.
fn replay(state: &ClusterState, events: &[(&str, &str, u64)]) {
    for &(subject, uuid, clock) in events {
        state
            .event(&task_event(subject, uuid, "h", clock, clock as f64))
            .expect("event");
    }
}

#[test]
fn test_snapshot_keeps_heap_that_differs_from_rebuild() {
    // A full heap has dropped every entry of the still-tracked task "a".
    let capped = bounded_state(4, 2, 1);
    replay(&capped, &CAPPED_EVENTS);
    // A late receipt for "u" lands in the heap above its task clock.
    let merged = ClusterState::new();
    replay(&merged, &[("started", "u", 5), ("received", "v", 7), ("received", "u", 9)]);

    for (state, expected) in [(&capped, vec!["b"]), (&merged, vec!["u", "v"])] {
        assert_eq!(uuids(&state.tasks_by_time(None)), expected);
        let json = state.snapshot().to_json().expect("encode");
        let snapshot = StateSnapshot::from_json(&json).expect("decode");
        let restored = ClusterState::from_snapshot(snapshot, Observers::new()).expect("restore");
        assert_eq!(uuids(&restored.tasks_by_time(None)), expected);
        assert_eq!(restored.heap_len(), state.heap_len());
    }
}

#[test]
fn test_snapshot_without_heap_rebuilds_it() {
    let state = bounded_state(4, 2, 1);
    replay(&state, &CAPPED_EVENTS);

    let mut snapshot = state.snapshot();
    assert!(snapshot.heap.as_ref().is_some_and(|heap| heap.iter().all(|e| e.live)));
    snapshot.heap = None;
    let restored = ClusterState::from_snapshot(snapshot, Observers::new()).expect("restore");
    assert_eq!(uuids(&restored.tasks_by_time(None)), vec!["b", "a"]);
}

#[test]
fn test_snapshot_rejects_invalid_config() {
    let mut snapshot = ClusterState::new().snapshot();
    snapshot.config.max_tasks = 0;
    assert!(ClusterState::from_snapshot(snapshot, Observers::new()).is_err());
    assert!(StateSnapshot::from_json("{not json").is_err());
}
