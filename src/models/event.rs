//! Event envelope as delivered by the producer.
//!
//! An event is a `type` string of the form `<group>-<subject>` plus a flat
//! map of arbitrary fields. Well-known fields get typed accessors that coerce
//! numbers sent as decimal strings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::constants::fields;

/// A single cluster observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dash-separated `group-subject`, e.g. `task-succeeded`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Every other field carried by the event.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Build an event from a `group` and `subject`.
    pub fn from_parts(group: &str, subject: &str, fields: Map<String, Value>) -> Self {
        Self {
            kind: format!("{group}-{subject}"),
            fields,
        }
    }

    /// Build an event from a JSON object carrying a `type` key.
    ///
    /// Returns `None` if the value is not an object or has no string `type`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut fields) = value else {
            return None;
        };
        let kind = match fields.remove(fields::TYPE)? {
            Value::String(kind) => kind,
            _ => return None,
        };
        Some(Self { kind, fields })
    }

    /// Set a field, returning the event.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Split `kind` on the first `-` into `(group, subject)`.
    ///
    /// A kind without a dash is all group and an empty subject.
    pub fn group_and_subject(&self) -> (&str, &str) {
        self.kind.split_once('-').unwrap_or((self.kind.as_str(), ""))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.get(fields::HOSTNAME).and_then(Value::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get(fields::UUID).and_then(Value::as_str)
    }

    /// Origin wall-clock time in POSIX seconds.
    pub fn timestamp(&self) -> Option<f64> {
        self.get(fields::TIMESTAMP).and_then(as_seconds)
    }

    /// Ingress wall-clock time in POSIX seconds.
    pub fn local_received(&self) -> Option<f64> {
        self.get(fields::LOCAL_RECEIVED).and_then(as_seconds)
    }

    /// Logical clock of the origin.
    pub fn clock(&self) -> Option<u64> {
        self.get(fields::CLOCK).and_then(as_clock)
    }
}

/// Coerce a JSON value holding seconds into an `f64`.
///
/// Accepts numbers and high-precision decimals sent as strings. Null,
/// non-numeric strings and non-finite results yield `None`.
pub fn as_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    seconds.is_finite().then_some(seconds)
}

/// Coerce a JSON value holding a logical clock into a `u64`.
pub fn as_clock(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
