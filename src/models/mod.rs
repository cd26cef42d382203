pub mod constants;
pub mod event;
pub mod task;
pub mod worker;

pub use event::Event;
pub use task::{Task, TaskState, READY_STATES};
pub use worker::{HeartbeatPolicy, Worker, WorkerStatus};
