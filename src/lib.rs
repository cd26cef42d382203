//! In-memory aggregator for the event stream of a distributed task-execution
//! cluster.
//!
//! Feed worker and task events to a [`ClusterState`]; it keeps the latest
//! known state of every worker and task in bounded LRU maps, tolerates
//! out-of-order and duplicate delivery, and answers recency queries from a
//! bounded event heap.

pub mod clock;
pub mod drift;
pub mod error;
pub mod heap;
pub mod logging;
pub mod lru;
pub mod models;
pub mod state;
pub mod time;

pub use error::{Error, Result};
pub use models::{Event, HeartbeatPolicy, Task, TaskState, Worker, WorkerStatus, READY_STATES};
pub use state::{
    ClusterState, ClusterView, Dispatch, HeapEntry, Observers, Outcome, StateConfig, StateSnapshot,
};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};
