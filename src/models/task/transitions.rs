use super::types::TaskState;

/// Terminal states.
pub const READY_STATES: [TaskState; 3] =
    [TaskState::Success, TaskState::Failure, TaskState::Revoked];

/// Fields an older `received` event may still contribute.
const RECEIVED_MERGE_FIELDS: &[&str] = &["name", "args", "kwargs", "retries", "eta", "expires"];

impl TaskState {
    /// Map an event subject to the state it announces.
    ///
    /// Subjects outside the lifecycle become a custom state named after the
    /// upper-cased subject.
    pub fn from_subject(subject: &str) -> TaskState {
        match subject {
            "sent" => TaskState::Pending,
            "received" => TaskState::Received,
            "started" => TaskState::Started,
            "failed" => TaskState::Failure,
            "retried" => TaskState::Retry,
            "succeeded" => TaskState::Success,
            "revoked" => TaskState::Revoked,
            other => TaskState::from(other.to_uppercase()),
        }
    }

    /// Position in the lattice. `Retry` has none.
    ///
    /// Custom states rank above `Started` and below the ready states.
    pub fn rank(&self) -> Option<u8> {
        match self {
            TaskState::Pending => Some(0),
            TaskState::Received => Some(1),
            TaskState::Started => Some(2),
            TaskState::Custom(_) => Some(3),
            TaskState::Success | TaskState::Failure | TaskState::Revoked => Some(4),
            TaskState::Retry => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        READY_STATES.contains(self)
    }

    /// Whether an event announcing `self` logically precedes a task already
    /// in `current`. `Retry` on either side never precedes.
    pub fn happens_before(&self, current: &TaskState) -> bool {
        match (self.rank(), current.rank()) {
            (Some(candidate), Some(current)) => candidate < current,
            _ => false,
        }
    }

    /// Fields an event announcing `self` may still set when it arrives after
    /// a later state.
    pub fn merge_fields(&self) -> &'static [&'static str] {
        match self {
            TaskState::Received => RECEIVED_MERGE_FIELDS,
            _ => &[],
        }
    }
}
