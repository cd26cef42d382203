//! Shared builders for integration tests

use std::sync::Arc;

use clusterwatch::drift::{self, DriftWarning};
use clusterwatch::logging::init_test_logging;
use clusterwatch::{ClusterState, Event, StateConfig, Task};
use parking_lot::Mutex;

/// Aggregator with small capacities so eviction is easy to reach.
pub fn bounded_state(max_workers: usize, max_tasks: usize, heap_multiplier: usize) -> ClusterState {
    init_test_logging();
    let config = StateConfig::default()
        .with_max_workers(max_workers)
        .with_max_tasks(max_tasks)
        .with_heap_multiplier(heap_multiplier);
    ClusterState::with_config(config).expect("valid config")
}

/// A worker event whose origin and ingress clocks agree.
pub fn worker_event(subject: &str, hostname: &str, ts: f64) -> Event {
    Event::new(format!("worker-{subject}"))
        .with("hostname", hostname)
        .with("timestamp", ts)
        .with("local_received", ts)
}

/// A task event handled by `hostname`.
pub fn task_event(subject: &str, uuid: &str, hostname: &str, clock: u64, ts: f64) -> Event {
    Event::new(format!("task-{subject}"))
        .with("uuid", uuid)
        .with("hostname", hostname)
        .with("clock", clock)
        .with("timestamp", ts)
        .with("local_received", ts)
}

pub fn uuids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|task| task.uuid.clone()).collect()
}

/// Routes drift warnings into a shared vector. Callers must be `#[serial]`.
pub fn capture_drift() -> Arc<Mutex<Vec<DriftWarning>>> {
    drift::reset();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    drift::set_sink(Box::new(move |warning: &DriftWarning| sink.lock().push(warning.clone())));
    captured
}

/// Deterministic xorshift generator for shuffling event sequences.
pub struct Shuffler(u64);

impl Shuffler {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

/// Every ordering of `items`.
pub fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first.clone());
            all.push(tail);
        }
    }
    all
}
