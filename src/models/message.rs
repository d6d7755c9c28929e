use super::{error::ErrorKind, task::Outcome};

/// Lifecycle notifications broadcast to `Task::subscribe` receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started { pid: u32 },
    Finished(Result<Outcome, ErrorKind>),
}
