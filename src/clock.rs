//! Total ordering of task events.
//!
//! Events are ordered by the origin's logical clock first so that wall-clock
//! skew between hosts never dominates, then by wall-clock timestamp, then by
//! origin, then by the identity of the task they point at.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Handle to a task that stays valid only while that exact task lives.
///
/// `serial` is unique per task instance. If the task is evicted and a new one
/// is later created with the same uuid, the old handle no longer resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRef {
    pub serial: u64,
    pub uuid: String,
}

/// Comparator tuple `(clock, timestamp, origin, task)`.
#[derive(Debug, Clone)]
pub struct TimeTuple {
    pub clock: u64,
    /// `None` sorts before every timestamp.
    pub timestamp: Option<f64>,
    pub origin: String,
    pub task: TaskRef,
}

impl TimeTuple {
    pub fn new(
        clock: u64,
        timestamp: Option<f64>,
        origin: impl Into<String>,
        task: TaskRef,
    ) -> Self {
        Self {
            clock,
            timestamp,
            origin: origin.into(),
            task,
        }
    }
}

fn cmp_timestamp(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

impl Ord for TimeTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        self.clock
            .cmp(&other.clock)
            .then_with(|| cmp_timestamp(self.timestamp, other.timestamp))
            .then_with(|| self.origin.cmp(&other.origin))
            .then_with(|| self.task.cmp(&other.task))
    }
}

impl PartialOrd for TimeTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimeTuple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeTuple {}
