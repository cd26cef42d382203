mod methods;
mod transitions;
mod types;


pub use transitions::READY_STATES;
pub use types::{Task, TaskState};
