//! Default routing of worker and task events.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::clock::{TaskRef, TimeTuple};
use crate::error::{Error, Result};
use crate::models::{Event, Task, Worker};

use super::observers::{NodeObserver, Observers};
use super::view::ClusterView;

/// What an event did to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A worker event was applied. `worker` is the state after the event.
    Worker { worker: Worker, created: bool },
    /// A task event was applied. `task` is the state after the event.
    Task { task: Task, created: bool },
    /// A custom group handler consumed the event.
    Handled(Option<Value>),
    /// No pathway exists for the event's group.
    Unhandled,
    /// A worker or task event lacked a required field.
    Dropped,
}

/// Result of [`super::ClusterState::event`]: the event's subject and its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub subject: String,
    pub outcome: Outcome,
}

impl Dispatch {
    pub(super) fn new(subject: &str, outcome: Outcome) -> Self {
        Self {
            subject: subject.to_string(),
            outcome,
        }
    }

    pub fn worker(&self) -> Option<&Worker> {
        match &self.outcome {
            Outcome::Worker { worker, .. } => Some(worker),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&Task> {
        match &self.outcome {
            Outcome::Task { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Whether the event created the entity it was applied to.
    pub fn created(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Worker { created: true, .. } | Outcome::Task { created: true, .. }
        )
    }
}

fn notify(hook: &'static str, observer: Option<&NodeObserver>, worker: &Worker) -> Result<()> {
    match observer {
        Some(f) => f(worker).map_err(|source| Error::Observer { hook, source }),
        None => Ok(()),
    }
}

impl ClusterView {
    fn drop_event(&mut self, event: &Event) -> Outcome {
        self.dropped_count += 1;
        debug!(kind = %event.kind, "dropping event with missing required fields");
        Outcome::Dropped
    }

    pub(super) fn worker_event(
        &mut self,
        subject: &str,
        event: &Event,
        observers: &Observers,
    ) -> Result<Outcome> {
        let (Some(hostname), Some(timestamp), Some(local_received)) =
            (event.hostname(), event.timestamp(), event.local_received())
        else {
            return Ok(self.drop_event(event));
        };
        let is_offline = subject == "offline";

        if is_offline && !self.workers.contains(hostname) {
            // Never seen this worker: build it only to tell the leave observer.
            let mut worker = Worker::new(hostname).with_policy(self.policy);
            worker.apply(Some(subject), Some(timestamp), Some(local_received), &event.fields);
            notify("on_node_leave", observers.on_node_leave.as_ref(), &worker)?;
            return Ok(Outcome::Worker {
                worker,
                created: false,
            });
        }

        let (worker, created) = self.get_or_create_worker(hostname);
        worker.apply(Some(subject), Some(timestamp), Some(local_received), &event.fields);
        let worker = worker.clone();

        if created || subject == "online" {
            debug!(hostname, "node joined");
            notify("on_node_join", observers.on_node_join.as_ref(), &worker)?;
        }

        if is_offline && observers.on_node_leave.is_some() {
            debug!(hostname, "node left");
            notify("on_node_leave", observers.on_node_leave.as_ref(), &worker)?;
            self.workers.remove(hostname);
        }

        Ok(Outcome::Worker { worker, created })
    }

    pub(super) fn task_event(&mut self, subject: &str, event: &Event) -> Result<Outcome> {
        let (Some(uuid), Some(hostname)) = (event.uuid(), event.hostname()) else {
            return Ok(self.drop_event(event));
        };
        let timestamp = event.timestamp();
        let local_received = event.local_received();
        let clock = event.clock().unwrap_or(0);
        let is_client_event = subject == "sent";

        let created = self.get_or_create_task(uuid).1;

        let origin = if is_client_event {
            hostname.to_string()
        } else {
            let (worker, _) = self.get_or_create_worker(hostname);
            if local_received.is_some() {
                // Task traffic doubles as a heartbeat; note the swapped clocks.
                worker.apply(None, local_received, timestamp, &Map::new());
            }
            worker.id()
        };

        let (task, _) = self.get_or_create_task(uuid);
        if is_client_event {
            task.client = Some(hostname.to_string());
        } else {
            task.worker = Some(hostname.to_string());
        }
        let task_ref = TaskRef {
            serial: task.serial,
            uuid: task.uuid.clone(),
        };
        let first_receipt = subject == "received" && !task.receipt_seen;
        if first_receipt {
            task.receipt_seen = true;
        }

        task.apply(subject, timestamp, local_received, &event.fields);
        let task = task.clone();

        self.heap
            .insert(TimeTuple::new(clock, timestamp, origin, task_ref));
        if first_receipt {
            self.task_count += 1;
        }
        if let Some(name) = &task.name {
            if !self.seen_types.contains(name) {
                self.seen_types.insert(name.clone());
            }
        }

        trace!(uuid, state = %task.state, clock, "applied task event");
        Ok(Outcome::Task { task, created })
    }
}
