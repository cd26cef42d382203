//! Core aggregator implementation

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{Error, Result};
use crate::models::{Event, Task, Worker};
use crate::time::{SystemTimeSource, TimeSource};

use super::config::StateConfig;
use super::dispatch::{Dispatch, Outcome};
use super::observers::{GroupHandler, Observers};
use super::snapshot::HeapEntry;
use super::view::ClusterView;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// Lock guard that remembers which thread holds the aggregator.
struct StateGuard<'a> {
    guard: MutexGuard<'a, ClusterView>,
    owner: &'a AtomicU64,
}

impl Deref for StateGuard<'_> {
    type Target = ClusterView;

    fn deref(&self) -> &ClusterView {
        &self.guard
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut ClusterView {
        &mut self.guard
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.owner.store(0, Ordering::SeqCst);
    }
}

/// In-memory picture of a cluster, fed by worker and task events.
///
/// Every operation takes one exclusive lock; observers and custom handlers
/// run while it is held.
pub struct ClusterState {
    inner: Mutex<ClusterView>,
    owner: AtomicU64,
    observers: Observers,
    handlers: HashMap<String, GroupHandler>,
    config: StateConfig,
    time: Arc<dyn TimeSource>,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self::from_parts(StateConfig::default(), Observers::default())
    }
}

impl ClusterState {
    /// Aggregator with default capacities and no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator with validated `config`.
    pub fn with_config(config: StateConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, Observers::default()))
    }

    pub(super) fn from_parts(config: StateConfig, observers: Observers) -> Self {
        Self {
            inner: Mutex::new(ClusterView::new(&config)),
            owner: AtomicU64::new(0),
            observers,
            handlers: HashMap::new(),
            config,
            time: Arc::new(SystemTimeSource),
        }
    }

    pub fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    /// Replace the clock used for liveness queries.
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Route every event of `group` to `handler` instead of the default pathway.
    pub fn register_handler<F>(&mut self, group: impl Into<String>, handler: F)
    where
        F: Fn(&mut ClusterView, &str, &Event) -> anyhow::Result<Option<Value>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(group.into(), Box::new(handler));
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    fn lock(&self) -> StateGuard<'_> {
        let token = thread_token();
        debug_assert_ne!(
            self.owner.load(Ordering::SeqCst),
            token,
            "re-entrant call into ClusterState from an observer or handler"
        );
        let guard = self.inner.lock();
        self.owner.store(token, Ordering::SeqCst);
        StateGuard {
            guard,
            owner: &self.owner,
        }
    }

    /// Ingest one event.
    ///
    /// Malformed worker and task events are counted and ignored. Errors come
    /// only from observers and custom handlers; the state keeps every
    /// mutation completed before the failure.
    pub fn event(&self, event: &Event) -> Result<Dispatch> {
        let mut guard = self.lock();
        let view: &mut ClusterView = &mut guard;
        view.event_count += 1;

        if let Some(on_event) = &self.observers.on_event {
            on_event(view, event).map_err(|source| Error::Observer {
                hook: "on_event",
                source,
            })?;
        }

        let (group, subject) = event.group_and_subject();
        trace!(group, subject, "dispatching event");

        if let Some(handler) = self.handlers.get(group) {
            let value = handler(view, subject, event).map_err(|source| Error::Handler {
                group: group.to_string(),
                source,
            })?;
            return Ok(Dispatch::new(subject, Outcome::Handled(value)));
        }

        let outcome = match group {
            "worker" => view.worker_event(subject, event, &self.observers)?,
            "task" => view.task_event(subject, event)?,
            _ => Outcome::Unhandled,
        };
        Ok(Dispatch::new(subject, outcome))
    }

    /// Ingest a `worker-<subject>` event built from `fields`.
    pub fn worker_event(&self, subject: &str, fields: Map<String, Value>) -> Result<Dispatch> {
        self.event(&Event::from_parts("worker", subject, fields))
    }

    /// Ingest a `task-<subject>` event built from `fields`.
    pub fn task_event(&self, subject: &str, fields: Map<String, Value>) -> Result<Dispatch> {
        self.event(&Event::from_parts("task", subject, fields))
    }

    /// Run `f` with the lock held, optionally clearing afterwards (keeping
    /// unfinished tasks) before the lock is released.
    pub fn freeze_while<R, F>(&self, f: F, clear_after: bool) -> R
    where
        F: FnOnce(&ClusterView) -> R,
    {
        let mut guard = self.lock();
        let result = f(&*guard);
        if clear_after {
            guard.clear(true);
        }
        result
    }

    /// Worker for `hostname`, created if absent, with `fields` applied as
    /// attribute updates.
    pub fn get_or_create_worker(
        &self,
        hostname: &str,
        fields: &Map<String, Value>,
    ) -> (Worker, bool) {
        let mut guard = self.lock();
        let (worker, created) = guard.get_or_create_worker(hostname);
        worker.update(fields);
        (worker.clone(), created)
    }

    pub fn get_or_create_task(&self, uuid: &str) -> (Task, bool) {
        let mut guard = self.lock();
        let (task, created) = guard.get_or_create_task(uuid);
        (task.clone(), created)
    }

    pub fn worker(&self, hostname: &str) -> Option<Worker> {
        self.lock().worker(hostname).cloned()
    }

    pub fn task(&self, uuid: &str) -> Option<Task> {
        self.lock().task(uuid).cloned()
    }

    /// Every tracked worker, least recently inserted first.
    pub fn workers(&self) -> Vec<Worker> {
        self.lock().workers().values().cloned().collect()
    }

    pub fn worker_count(&self) -> usize {
        self.lock().workers().len()
    }

    pub fn tracked_task_count(&self) -> usize {
        self.lock().tasks().len()
    }

    pub fn heap_len(&self) -> usize {
        self.lock().heap().len()
    }

    pub fn event_count(&self) -> u64 {
        self.lock().event_count()
    }

    pub fn task_count(&self) -> u64 {
        self.lock().task_count()
    }

    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped_count()
    }

    /// Tasks ordered by their most recent event, newest first.
    pub fn tasks_by_time(&self, limit: Option<usize>) -> Vec<Task> {
        self.lock().tasks_by_time(limit).into_iter().cloned().collect()
    }

    pub fn tasks_by_type(&self, name: &str, limit: Option<usize>) -> Vec<Task> {
        self.lock()
            .tasks_by_type(name, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn tasks_by_worker(&self, hostname: &str, limit: Option<usize>) -> Vec<Task> {
        self.lock()
            .tasks_by_worker(hostname, limit)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn itertasks(&self, limit: Option<usize>) -> Vec<Task> {
        self.lock().itertasks(limit).into_iter().cloned().collect()
    }

    pub fn task_types(&self) -> Vec<String> {
        self.lock().task_types()
    }

    /// Workers whose last heartbeat has not yet expired.
    pub fn alive_workers(&self) -> Vec<Worker> {
        let now = self.time.now();
        self.lock()
            .alive_workers(now)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn clear_tasks(&self, ready: bool) {
        self.lock().clear_tasks(ready);
    }

    pub fn clear(&self, ready: bool) {
        self.lock().clear(ready);
    }

    pub fn rebuild_taskheap(&self) {
        self.lock().rebuild_taskheap();
    }

    pub(super) fn restore(
        &self,
        workers: Vec<Worker>,
        tasks: Vec<Task>,
        heap: Option<Vec<HeapEntry>>,
        event_count: u64,
        task_count: u64,
    ) {
        let mut guard = self.lock();
        guard.restore(workers, tasks);
        guard.event_count = event_count;
        guard.task_count = task_count;
        match heap {
            Some(entries) => guard.restore_heap(entries),
            None => guard.rebuild_taskheap(),
        }
    }
}

impl std::fmt::Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let view = self.lock();
        write!(
            f,
            "<State: events={} tasks={}>",
            view.event_count(),
            view.task_count()
        )
    }
}

impl std::fmt::Debug for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterState")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
