//! Configuration for the aggregator

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::constants::{HEAP_MULTIPLIER, MAX_TASKS, MAX_WORKERS};
use crate::models::worker::HeartbeatPolicy;

/// Capacities and heartbeat limits of a [`super::ClusterState`].
///
/// Loadable from TOML; every key is optional:
///
/// ```toml
/// max_workers = 5000
/// max_tasks = 10000
/// heap_multiplier = 4
///
/// [heartbeat]
/// expire_window = 200
/// drift_max = 16.0
/// max = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub max_workers: usize,
    pub max_tasks: usize,
    pub heap_multiplier: usize,
    pub heartbeat: HeartbeatPolicy,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_workers: MAX_WORKERS,
            max_tasks: MAX_TASKS,
            heap_multiplier: HEAP_MULTIPLIER,
            heartbeat: HeartbeatPolicy::default(),
        }
    }
}

impl StateConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    pub fn with_heap_multiplier(mut self, heap_multiplier: usize) -> Self {
        self.heap_multiplier = heap_multiplier;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: HeartbeatPolicy) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Capacity of the event heap.
    pub fn heap_capacity(&self) -> usize {
        self.max_tasks.saturating_mul(self.heap_multiplier)
    }

    /// Parse a TOML document and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::invalid_config("max_workers", "must be > 0"));
        }
        if self.max_tasks == 0 {
            return Err(Error::invalid_config("max_tasks", "must be > 0"));
        }
        if self.heap_multiplier == 0 {
            return Err(Error::invalid_config("heap_multiplier", "must be > 0"));
        }
        if self.heartbeat.max == 0 {
            return Err(Error::invalid_config("heartbeat.max", "must be > 0"));
        }
        if self.heartbeat.expire_window == 0 {
            return Err(Error::invalid_config("heartbeat.expire_window", "must be > 0"));
        }
        if !(self.heartbeat.drift_max.is_finite() && self.heartbeat.drift_max >= 0.0) {
            return Err(Error::invalid_config(
                "heartbeat.drift_max",
                format!(
                    "must be a finite, non-negative number of seconds, got {}",
                    self.heartbeat.drift_max
                ),
            ));
        }
        Ok(())
    }
}
