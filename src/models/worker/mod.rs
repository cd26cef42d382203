mod methods;
mod types;


pub use methods::heartbeat_expires;
pub use types::{HeartbeatPolicy, Worker, WorkerStatus};
