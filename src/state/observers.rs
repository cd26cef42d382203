//! Callbacks invoked while events are dispatched.
//!
//! All callbacks run with the aggregator lock held. They must not block and
//! must not call back into the [`super::ClusterState`] that invoked them.

use serde_json::Value;

use crate::models::{Event, Worker};

use super::view::ClusterView;

/// Called for every event before it is routed.
pub type EventObserver = Box<dyn Fn(&ClusterView, &Event) -> anyhow::Result<()> + Send + Sync>;

/// Called when a worker joins or leaves.
pub type NodeObserver = Box<dyn Fn(&Worker) -> anyhow::Result<()> + Send + Sync>;

/// Replaces the default pathway for one event group. Receives the subject
/// and the event; its return value is passed back to the caller.
pub type GroupHandler =
    Box<dyn Fn(&mut ClusterView, &str, &Event) -> anyhow::Result<Option<Value>> + Send + Sync>;

/// Optional observers of an aggregator.
#[derive(Default)]
pub struct Observers {
    pub on_event: Option<EventObserver>,
    pub on_node_join: Option<NodeObserver>,
    pub on_node_leave: Option<NodeObserver>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ClusterView, &Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_node_join<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_node_join = Some(Box::new(f));
        self
    }

    pub fn on_node_leave<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_node_leave = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("on_event", &self.on_event.is_some())
            .field("on_node_join", &self.on_node_join.is_some())
            .field("on_node_leave", &self.on_node_leave.is_some())
            .finish()
    }
}
