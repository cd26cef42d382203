use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::constants::{
    DEFAULT_HEARTBEAT_FREQ, HEARTBEAT_DRIFT_MAX, HEARTBEAT_EXPIRE_WINDOW, HEARTBEAT_MAX,
};

/// Heartbeat bookkeeping limits applied to every worker of an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatPolicy {
    /// Grace period as a percentage of the worker's `freq`.
    pub expire_window: u32,
    /// Drift in seconds above which a warning is emitted.
    pub drift_max: f64,
    /// Heartbeats retained per worker.
    pub max: usize,
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            expire_window: HEARTBEAT_EXPIRE_WINDOW,
            drift_max: HEARTBEAT_DRIFT_MAX,
            max: HEARTBEAT_MAX,
        }
    }
}

fn default_freq() -> f64 {
    DEFAULT_HEARTBEAT_FREQ
}

/// Per-host aggregate built from worker events and task traffic.
///
/// Equality and hashing use only `hostname`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub hostname: String,
    #[serde(default)]
    pub pid: Option<u32>,
    /// Heartbeat period in seconds.
    #[serde(default = "default_freq")]
    pub freq: f64,
    /// Recent heartbeat receive times, ascending.
    #[serde(default)]
    pub heartbeats: Vec<f64>,
    /// Highest logical clock reported by the worker.
    #[serde(default)]
    pub clock: u64,
    #[serde(default)]
    pub active: Option<u64>,
    #[serde(default)]
    pub processed: Option<u64>,
    #[serde(default)]
    pub loadavg: Option<Vec<f64>>,
    #[serde(default)]
    pub sw_ident: Option<String>,
    #[serde(default)]
    pub sw_ver: Option<String>,
    #[serde(default)]
    pub sw_sys: Option<String>,
    /// Event fields with no dedicated attribute.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub(crate) policy: HeartbeatPolicy,
}

impl PartialEq for Worker {
    fn eq(&self, other: &Self) -> bool {
        self.hostname == other.hostname
    }
}

impl Eq for Worker {}

impl Hash for Worker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hostname.hash(state);
    }
}

/// Liveness as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Online => write!(f, "ONLINE"),
            WorkerStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}
