//! Point-in-time copies of an aggregator.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Task, Worker};

use super::config::StateConfig;
use super::core::ClusterState;
use super::observers::Observers;

/// One event-heap entry, oldest first in [`StateSnapshot::heap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapEntry {
    pub uuid: String,
    pub clock: u64,
    #[serde(default)]
    pub timestamp: Option<f64>,
    pub origin: String,
    /// The entry pointed at a task that was still tracked. Entries left by
    /// evicted tasks are kept so the heap fills up the same way.
    pub live: bool,
}

/// Serializable copy of a [`ClusterState`].
///
/// Workers and tasks are listed least recently inserted first, so restoring
/// keeps their eviction order. The event heap is stored as-is; a snapshot
/// without one gets its heap rebuilt from the tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub config: StateConfig,
    pub workers: Vec<Worker>,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap: Option<Vec<HeapEntry>>,
    pub event_count: u64,
    pub task_count: u64,
}

impl StateSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ClusterState {
    /// Copy workers, tasks, the event heap and counters under the lock.
    pub fn snapshot(&self) -> StateSnapshot {
        let config = self.config().clone();
        self.freeze_while(
            |view| StateSnapshot {
                config,
                workers: view.workers().values().cloned().collect(),
                tasks: view.tasks().values().cloned().collect(),
                heap: Some(view.heap_entries()),
                event_count: view.event_count(),
                task_count: view.task_count(),
            },
            false,
        )
    }

    /// Rebuild an aggregator from `snapshot`, attaching `observers`.
    ///
    /// Recency queries answer as they did on the original. Observers are not
    /// invoked for the restored workers.
    pub fn from_snapshot(snapshot: StateSnapshot, observers: Observers) -> Result<Self> {
        snapshot.config.validate()?;
        let state = ClusterState::from_parts(snapshot.config, observers);
        state.restore(
            snapshot.workers,
            snapshot.tasks,
            snapshot.heap,
            snapshot.event_count,
            snapshot.task_count,
        );
        Ok(state)
    }
}
