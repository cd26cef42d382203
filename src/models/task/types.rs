use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of a task as observed through events.
///
/// State lattice:
/// - `Pending` -> `Received` -> `Started` -> `Success` | `Failure` | `Revoked`
/// - `Retry` may occur at any point and sits outside the lattice
/// - `Custom` covers subjects with no dedicated state (e.g. `REJECTED`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    #[default]
    Pending,
    Received,
    Started,
    Success,
    Failure,
    Revoked,
    Retry,
    Custom(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Received => "RECEIVED",
            TaskState::Started => "STARTED",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Revoked => "REVOKED",
            TaskState::Retry => "RETRY",
            TaskState::Custom(name) => name,
        }
    }
}

impl From<&str> for TaskState {
    fn from(name: &str) -> Self {
        match name {
            "PENDING" => TaskState::Pending,
            "RECEIVED" => TaskState::Received,
            "STARTED" => TaskState::Started,
            "SUCCESS" => TaskState::Success,
            "FAILURE" => TaskState::Failure,
            "REVOKED" => TaskState::Revoked,
            "RETRY" => TaskState::Retry,
            other => TaskState::Custom(other.to_string()),
        }
    }
}

impl From<String> for TaskState {
    fn from(name: String) -> Self {
        TaskState::from(name.as_str())
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-uuid aggregate built from task events.
///
/// Equality and hashing use only `uuid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: TaskState,

    // Per-transition timestamps.
    #[serde(default)]
    pub sent: Option<f64>,
    #[serde(default)]
    pub received: Option<f64>,
    #[serde(default)]
    pub started: Option<f64>,
    #[serde(default)]
    pub succeeded: Option<f64>,
    #[serde(default)]
    pub failed: Option<f64>,
    #[serde(default)]
    pub retried: Option<f64>,
    #[serde(default)]
    pub revoked: Option<f64>,

    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default)]
    pub kwargs: Option<Value>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub retries: Option<u32>,
    /// Hostname of the worker handling the task.
    #[serde(default)]
    pub worker: Option<String>,
    /// Hostname of the client that sent the task.
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub routing_key: Option<String>,
    /// Origin timestamp of the event that set the current state.
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub local_received: Option<f64>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub clock: u64,
    /// Event fields with no dedicated attribute.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
    /// Set once a `received` event has been counted for this task.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) receipt_seen: bool,
    /// Identity of this task instance; see [`crate::clock::TaskRef`].
    #[serde(skip)]
    pub(crate) serial: u64,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}
