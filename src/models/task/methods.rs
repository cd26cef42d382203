use serde_json::{Map, Value};

use crate::models::constants::fields;
use crate::models::event::{as_clock, as_seconds};
use crate::models::worker::Worker;

use super::types::{Task, TaskState};

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

impl Task {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: None,
            state: TaskState::Pending,
            sent: None,
            received: None,
            started: None,
            succeeded: None,
            failed: None,
            retried: None,
            revoked: None,
            args: None,
            kwargs: None,
            eta: None,
            expires: None,
            retries: None,
            worker: None,
            client: None,
            result: None,
            exception: None,
            traceback: None,
            exchange: None,
            routing_key: None,
            timestamp: None,
            local_received: None,
            runtime: None,
            clock: 0,
            extra: Map::new(),
            receipt_seen: false,
            serial: 0,
        }
    }

    pub fn ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Whether a `received` event has been seen for this task.
    pub fn receipt_seen(&self) -> bool {
        self.receipt_seen
    }

    /// Worker id when a worker handled the task, else the sending client.
    pub fn origin(&self, worker: Option<&Worker>) -> Option<String> {
        match worker {
            Some(worker) => Some(worker.id()),
            None => self.client.clone(),
        }
    }

    /// Apply one task event.
    ///
    /// An event whose state logically precedes the current one (e.g. a
    /// `received` delivered after `started`) only contributes its merge
    /// fields; state and timestamp are left alone. Every other event takes
    /// over the state and copies all its fields.
    pub fn apply(
        &mut self,
        subject: &str,
        timestamp: Option<f64>,
        local_received: Option<f64>,
        fields: &Map<String, Value>,
    ) {
        let state = TaskState::from_subject(subject);
        self.record_transition(subject, timestamp);

        if state.happens_before(&self.state) {
            for key in state.merge_fields() {
                if let Some(value) = fields.get(*key) {
                    self.set_field(key, value);
                }
            }
            return;
        }

        for (key, value) in fields {
            self.set_field(key, value);
        }
        self.state = state;
        self.timestamp = timestamp;
        self.local_received = local_received;
    }

    fn record_transition(&mut self, subject: &str, timestamp: Option<f64>) {
        let slot = match subject {
            "sent" => &mut self.sent,
            "received" => &mut self.received,
            "started" => &mut self.started,
            "succeeded" => &mut self.succeeded,
            "failed" => &mut self.failed,
            "retried" => &mut self.retried,
            "revoked" => &mut self.revoked,
            _ => return,
        };
        *slot = timestamp;
    }

    fn set_field(&mut self, key: &str, value: &Value) {
        match key {
            fields::TYPE
            | fields::UUID
            | fields::HOSTNAME
            | fields::TIMESTAMP
            | fields::LOCAL_RECEIVED
            | "state"
            | "worker"
            | "client" => {}
            "name" => self.name = value.as_str().map(str::to_string),
            "args" => self.args = non_null(value),
            "kwargs" => self.kwargs = non_null(value),
            "eta" => self.eta = as_string(value),
            "expires" => self.expires = as_string(value),
            "retries" => self.retries = value.as_u64().and_then(|r| u32::try_from(r).ok()),
            "result" => self.result = non_null(value),
            "exception" => self.exception = as_string(value),
            "traceback" => self.traceback = as_string(value),
            "exchange" => self.exchange = as_string(value),
            "routing_key" => self.routing_key = as_string(value),
            "runtime" => self.runtime = as_seconds(value),
            fields::CLOCK => {
                if let Some(clock) = as_clock(value) {
                    self.clock = clock;
                }
            }
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }
    }

    /// Non-null public fields as a JSON object.
    pub fn info(&self) -> Map<String, Value> {
        let mut info = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        info.retain(|_, value| !value.is_null());
        info
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Task: {}({}) {} clock:{}>",
            self.name.as_deref().unwrap_or("<unknown>"),
            self.uuid,
            self.state,
            self.clock
        )
    }
}
