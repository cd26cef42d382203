//! The aggregator: event dispatch, bounded storage and queries.

mod config;
mod core;
mod dispatch;
mod observers;
mod snapshot;
mod view;


pub use config::StateConfig;
pub use core::ClusterState;
pub use dispatch::{Dispatch, Outcome};
pub use observers::{EventObserver, GroupHandler, NodeObserver, Observers};
pub use snapshot::{HeapEntry, StateSnapshot};
pub use view::ClusterView;
