/// Percentage of a worker's heartbeat frequency added as grace before it is
/// considered offline. At 200, a worker with `freq = 60` expires 120s after
/// its last heartbeat.
pub const HEARTBEAT_EXPIRE_WINDOW: u32 = 200;

/// Maximum tolerated difference, in seconds, between an event's origin
/// timestamp and the time it was received locally.
pub const HEARTBEAT_DRIFT_MAX: f64 = 16.0;

/// Number of heartbeats retained per worker.
pub const HEARTBEAT_MAX: usize = 4;

/// Default heartbeat period, in seconds, assumed for workers that never reported one.
pub const DEFAULT_HEARTBEAT_FREQ: f64 = 60.0;

/// Default capacity of the worker map.
pub const MAX_WORKERS: usize = 5000;

/// Default capacity of the task map.
pub const MAX_TASKS: usize = 10_000;

/// Event heap capacity is `max_tasks * HEAP_MULTIPLIER`.
pub const HEAP_MULTIPLIER: usize = 4;

/// Number of hostnames remembered by the drift-warning memo.
pub const DRIFT_MEMO_CAPACITY: usize = 1000;

/// Event envelope field names.
pub mod fields {
    pub const TYPE: &str = "type";
    pub const HOSTNAME: &str = "hostname";
    pub const UUID: &str = "uuid";
    pub const TIMESTAMP: &str = "timestamp";
    pub const LOCAL_RECEIVED: &str = "local_received";
    pub const CLOCK: &str = "clock";
}
