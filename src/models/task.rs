use std::process::ExitStatus;

/// Where a task currently is in its `run()` lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Locking,
    Preparing,
    Running,
    Finalizing,
}

/// How a launched script ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(i32),
}

impl Outcome {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            Outcome::Success
        } else {
            Outcome::Failed(code)
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self::from_code(exit_code(status))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Exit code of a finished process; signal deaths map to `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
