use serde_json::{Map, Value};

use crate::drift;
use crate::models::constants::{fields, DEFAULT_HEARTBEAT_FREQ};
use crate::models::event::{as_clock, as_seconds};
use crate::time::unix_now;

use super::types::{HeartbeatPolicy, Worker, WorkerStatus};

/// Time at which a heartbeat received at `timestamp` stops vouching for a
/// worker beating every `freq` seconds.
pub fn heartbeat_expires(timestamp: f64, freq: f64, expire_window: u32) -> f64 {
    timestamp + freq * (f64::from(expire_window) / 100.0)
}

impl Worker {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            pid: None,
            freq: DEFAULT_HEARTBEAT_FREQ,
            heartbeats: Vec::new(),
            clock: 0,
            active: None,
            processed: None,
            loadavg: None,
            sw_ident: None,
            sw_ver: None,
            sw_sys: None,
            extra: Map::new(),
            policy: HeartbeatPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: HeartbeatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> HeartbeatPolicy {
        self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: HeartbeatPolicy) {
        self.policy = policy;
    }

    /// `hostname.pid`, or just the hostname while the pid is unknown.
    pub fn id(&self) -> String {
        match self.pid {
            Some(pid) => format!("{}.{}", self.hostname, pid),
            None => self.hostname.clone(),
        }
    }

    pub fn last_heartbeat(&self) -> Option<f64> {
        self.heartbeats.last().copied()
    }

    pub fn heartbeat_expires(&self) -> Option<f64> {
        self.last_heartbeat()
            .map(|last| heartbeat_expires(last, self.freq, self.policy.expire_window))
    }

    pub fn alive_at(&self, now: f64) -> bool {
        self.heartbeat_expires()
            .is_some_and(|expires| now < expires)
    }

    /// Liveness against the system clock.
    pub fn alive(&self) -> bool {
        self.alive_at(unix_now())
    }

    pub fn status_at(&self, now: f64) -> WorkerStatus {
        if self.alive_at(now) {
            WorkerStatus::Online
        } else {
            WorkerStatus::Offline
        }
    }

    /// Copy event fields onto attributes without recording a heartbeat.
    pub fn update(&mut self, fields: &Map<String, Value>) {
        for (key, value) in fields {
            self.set_field(key, value);
        }
    }

    /// Apply one worker event.
    ///
    /// `subject` is the part after `worker-`, or `None` for a heartbeat
    /// synthesized from task traffic. Events without both timestamps update
    /// attributes only.
    pub fn apply(
        &mut self,
        subject: Option<&str>,
        timestamp: Option<f64>,
        local_received: Option<f64>,
        fields: &Map<String, Value>,
    ) {
        self.update(fields);

        if subject == Some("offline") {
            self.heartbeats.clear();
            return;
        }

        let (Some(timestamp), Some(local_received)) = (timestamp, local_received) else {
            return;
        };

        drift::report(
            &self.hostname,
            timestamp,
            local_received,
            self.policy.drift_max,
        );

        let max = self.policy.max.max(1);
        while self.heartbeats.len() >= max {
            self.heartbeats.remove(0);
        }

        match self.heartbeats.last() {
            Some(last) if local_received < *last => {
                let at = self
                    .heartbeats
                    .partition_point(|beat| *beat <= local_received);
                self.heartbeats.insert(at, local_received);
            }
            _ => self.heartbeats.push(local_received),
        }
    }

    fn set_field(&mut self, key: &str, value: &Value) {
        match key {
            fields::TYPE | fields::HOSTNAME | fields::TIMESTAMP | fields::LOCAL_RECEIVED => {}
            "heartbeats" => {}
            "pid" => self.pid = value.as_u64().and_then(|pid| u32::try_from(pid).ok()),
            "freq" => {
                if let Some(freq) = as_seconds(value) {
                    self.freq = freq;
                }
            }
            fields::CLOCK => {
                if let Some(clock) = as_clock(value) {
                    self.clock = self.clock.max(clock);
                }
            }
            "active" => self.active = value.as_u64(),
            "processed" => self.processed = value.as_u64(),
            "loadavg" => {
                self.loadavg = value
                    .as_array()
                    .map(|loads| loads.iter().filter_map(as_seconds).collect());
            }
            "sw_ident" => self.sw_ident = value.as_str().map(str::to_string),
            "sw_ver" => self.sw_ver = value.as_str().map(str::to_string),
            "sw_sys" => self.sw_sys = value.as_str().map(str::to_string),
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }
    }
}

impl std::fmt::Display for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Worker: {} ({}) clock:{}>",
            self.hostname,
            self.status_at(unix_now()),
            self.clock
        )
    }
}
