//! The data guarded by the aggregator lock.

use std::collections::{BTreeSet, HashSet};

use crate::clock::{TaskRef, TimeTuple};
use crate::heap::EventHeap;
use crate::lru::LruMap;
use crate::models::{HeartbeatPolicy, Task, Worker};

use super::config::StateConfig;
use super::snapshot::HeapEntry;

/// Workers, tasks and the event heap of one aggregator.
///
/// Observers and custom handlers receive this directly; everyone else goes
/// through [`super::ClusterState`], which holds the lock.
#[derive(Debug)]
pub struct ClusterView {
    pub(super) workers: LruMap<String, Worker>,
    pub(super) tasks: LruMap<String, Task>,
    pub(super) heap: EventHeap,
    pub(super) seen_types: BTreeSet<String>,
    pub(super) event_count: u64,
    pub(super) task_count: u64,
    pub(super) dropped_count: u64,
    pub(super) policy: HeartbeatPolicy,
    next_serial: u64,
}

impl ClusterView {
    pub(super) fn new(config: &StateConfig) -> Self {
        Self {
            workers: LruMap::new(config.max_workers),
            tasks: LruMap::new(config.max_tasks),
            heap: EventHeap::new(config.heap_capacity()),
            seen_types: BTreeSet::new(),
            event_count: 0,
            task_count: 0,
            dropped_count: 0,
            policy: config.heartbeat,
            next_serial: 0,
        }
    }

    pub fn workers(&self) -> &LruMap<String, Worker> {
        &self.workers
    }

    pub fn tasks(&self) -> &LruMap<String, Task> {
        &self.tasks
    }

    pub fn heap(&self) -> &EventHeap {
        &self.heap
    }

    pub fn worker(&self, hostname: &str) -> Option<&Worker> {
        self.workers.get(hostname)
    }

    pub fn task(&self, uuid: &str) -> Option<&Task> {
        self.tasks.get(uuid)
    }

    /// Events received, including dropped and unhandled ones.
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Distinct tasks seen in the `received` state.
    pub fn task_count(&self) -> u64 {
        self.task_count
    }

    /// Worker and task events ignored for missing required fields.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Worker id for worker-handled tasks, else the client hostname.
    pub fn task_origin(&self, task: &Task) -> Option<String> {
        let worker = task
            .worker
            .as_deref()
            .and_then(|hostname| self.workers.get(hostname));
        match (worker, task.worker.as_deref()) {
            (Some(worker), _) => task.origin(Some(worker)),
            (None, Some(hostname)) => Some(hostname.to_string()),
            (None, None) => task.origin(None),
        }
    }

    /// Follow a heap entry to its task, if that exact task is still tracked.
    fn resolve(&self, task_ref: &TaskRef) -> Option<&Task> {
        self.tasks
            .get(task_ref.uuid.as_str())
            .filter(|task| task.serial == task_ref.serial)
    }

    /// Tasks ordered by their most recent event, newest first.
    pub fn tasks_by_time(&self, limit: Option<usize>) -> Vec<&Task> {
        self.tasks_by_time_filtered(limit, |_| true)
    }

    pub fn tasks_by_type(&self, name: &str, limit: Option<usize>) -> Vec<&Task> {
        self.tasks_by_time_filtered(limit, |task| task.name.as_deref() == Some(name))
    }

    pub fn tasks_by_worker(&self, hostname: &str, limit: Option<usize>) -> Vec<&Task> {
        self.tasks_by_time_filtered(limit, |task| task.worker.as_deref() == Some(hostname))
    }

    fn tasks_by_time_filtered<F>(&self, limit: Option<usize>, keep: F) -> Vec<&Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for entry in self.heap.iter_newest() {
            if limit.is_some_and(|limit| found.len() >= limit) {
                break;
            }
            let Some(task) = self.resolve(&entry.task) else {
                continue;
            };
            if !seen.insert(task.uuid.as_str()) {
                continue;
            }
            if keep(task) {
                found.push(task);
            }
        }

        found
    }

    /// Tasks in recency order, least recent first.
    pub fn itertasks(&self, limit: Option<usize>) -> Vec<&Task> {
        self.tasks
            .values()
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Every task name seen so far, sorted.
    pub fn task_types(&self) -> Vec<String> {
        self.seen_types.iter().cloned().collect()
    }

    pub fn alive_workers(&self, now: f64) -> Vec<&Worker> {
        self.workers
            .values()
            .filter(|worker| worker.alive_at(now))
            .collect()
    }

    /// The tracked worker for `hostname`, created if absent.
    ///
    /// Existing workers keep their place in the eviction order.
    pub fn get_or_create_worker(&mut self, hostname: &str) -> (&mut Worker, bool) {
        let policy = self.policy;
        let (worker, created, evicted) = self
            .workers
            .get_or_insert_with(hostname.to_string(), || {
                Worker::new(hostname).with_policy(policy)
            });
        if let Some((evicted, _)) = evicted {
            tracing::debug!(hostname = %evicted, "evicted least recently used worker");
        }
        if created {
            tracing::debug!(hostname, "tracking new worker");
        }
        (worker, created)
    }

    /// The tracked task for `uuid`, created if absent.
    pub fn get_or_create_task(&mut self, uuid: &str) -> (&mut Task, bool) {
        let serial = self.next_serial + 1;
        let (task, created, evicted) = self.tasks.get_or_insert_with(uuid.to_string(), || {
            let mut task = Task::new(uuid);
            task.serial = serial;
            task
        });
        if created {
            self.next_serial = serial;
        }
        if let Some((evicted, _)) = evicted {
            tracing::debug!(uuid = %evicted, "evicted least recently used task");
        }
        (task, created)
    }

    /// Drop tasks. With `ready`, tasks that have not finished are kept.
    ///
    /// The event heap is emptied either way.
    pub fn clear_tasks(&mut self, ready: bool) {
        if ready {
            let in_progress: Vec<(String, Task)> = self
                .tasks
                .iter()
                .filter(|(_, task)| !task.ready())
                .map(|(uuid, task)| (uuid.clone(), task.clone()))
                .collect();
            self.tasks.clear();
            self.tasks.update(in_progress);
        } else {
            self.tasks.clear();
        }
        self.heap.clear();
    }

    /// Drop tasks as [`ClusterView::clear_tasks`] does, drop every worker,
    /// and zero the counters.
    pub fn clear(&mut self, ready: bool) {
        self.clear_tasks(ready);
        self.workers.clear();
        self.event_count = 0;
        self.task_count = 0;
        self.dropped_count = 0;
    }

    /// Regenerate the event heap with one entry per tracked task.
    pub fn rebuild_taskheap(&mut self) {
        let tuples: Vec<TimeTuple> = self
            .tasks
            .values()
            .map(|task| {
                TimeTuple::new(
                    task.clock,
                    task.timestamp,
                    self.task_origin(task).unwrap_or_default(),
                    TaskRef {
                        serial: task.serial,
                        uuid: task.uuid.clone(),
                    },
                )
            })
            .collect();
        self.heap.rebuild(tuples);
    }

    /// The event heap, oldest first, in serializable form.
    pub(super) fn heap_entries(&self) -> Vec<HeapEntry> {
        self.heap
            .iter()
            .map(|entry| HeapEntry {
                uuid: entry.task.uuid.clone(),
                clock: entry.clock,
                timestamp: entry.timestamp,
                origin: entry.origin.clone(),
                live: self.resolve(&entry.task).is_some(),
            })
            .collect()
    }

    /// Replace the event heap with recorded entries. Live entries point at
    /// the restored task of the same uuid; the rest resolve to nothing.
    pub(super) fn restore_heap(&mut self, entries: Vec<HeapEntry>) {
        let tuples: Vec<TimeTuple> = entries
            .into_iter()
            .map(|entry| {
                // Serials start at 1, so 0 never resolves.
                let serial = if entry.live {
                    self.tasks.get(entry.uuid.as_str()).map_or(0, |task| task.serial)
                } else {
                    0
                };
                TimeTuple::new(
                    entry.clock,
                    entry.timestamp,
                    entry.origin,
                    TaskRef {
                        serial,
                        uuid: entry.uuid,
                    },
                )
            })
            .collect();
        self.heap.restore(tuples);
    }

    /// Insert already-built entities, e.g. from a snapshot. Tasks get fresh
    /// serials and workers take this aggregator's heartbeat policy.
    pub(super) fn restore(&mut self, workers: Vec<Worker>, tasks: Vec<Task>) {
        let policy = self.policy;
        self.workers.update(workers.into_iter().map(|mut worker| {
            worker.set_policy(policy);
            (worker.hostname.clone(), worker)
        }));

        for mut task in tasks {
            self.next_serial += 1;
            task.serial = self.next_serial;
            if let Some(name) = &task.name {
                self.seen_types.insert(name.clone());
            }
            self.tasks.put(task.uuid.clone(), task);
        }
    }
}
