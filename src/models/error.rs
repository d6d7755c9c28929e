use std::{io, path::PathBuf};

use thiserror::Error;

pub type TaskResult<T> = Result<T, TaskError>;

/// Why a task could not run, or why its log could not be read.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task is already running")]
    AlreadyRunning,
    #[error("workspace is locked: {}", path.display())]
    WorkspaceLocked { path: PathBuf },
    #[error("failed to create {}: {source}", path.display())]
    CreateFileFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open log {}: {source}", path.display())]
    OpenLogFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to launch {}: {source}", program.display())]
    LaunchFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Comparable discriminant of a [`TaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyRunning,
    WorkspaceLocked,
    CreateFileFailed,
    OpenLogFailed,
    LaunchFailed,
}

impl TaskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::AlreadyRunning => ErrorKind::AlreadyRunning,
            TaskError::WorkspaceLocked { .. } => ErrorKind::WorkspaceLocked,
            TaskError::CreateFileFailed { .. } => ErrorKind::CreateFileFailed,
            TaskError::OpenLogFailed { .. } => ErrorKind::OpenLogFailed,
            TaskError::LaunchFailed { .. } => ErrorKind::LaunchFailed,
        }
    }

    pub(crate) fn create(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> TaskError {
        let path = path.into();
        move |source| TaskError::CreateFileFailed { path, source }
    }
}
