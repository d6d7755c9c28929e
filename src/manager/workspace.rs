use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use log::debug;

use crate::models::error::{TaskError, TaskResult};

const LOCK_FILE: &str = ".task.lock";
const BOOTSTRAP_FILE: &str = ".bootstrap.sh";

/// The private directory `<root>/<name>` a task owns, and the files in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    name: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir().join(format!("{}.sh", self.name))
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir().join(format!("{}.txt", self.name))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir().join(LOCK_FILE)
    }

    pub fn bootstrap_path(&self) -> PathBuf {
        self.dir().join(BOOTSTRAP_FILE)
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path().exists()
    }

    /// Wipes any previous run's directory and creates an empty one.
    pub fn recreate(&self) -> TaskResult<()> {
        let dir = self.dir();
        remove_dir_if_exists(&dir).map_err(TaskError::create(&dir))?;
        fs::create_dir_all(&dir).map_err(TaskError::create(&dir))
    }

    /// Creates the lock file. Any failure, including losing a race to another
    /// holder, counts as a locked workspace.
    pub fn lock(&self) -> TaskResult<()> {
        let path = self.lock_path();
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(()),
            Err(err) => {
                debug!(target: "shell_task", "Cannot create {}: {}", path.display(), err);
                Err(TaskError::WorkspaceLocked { path })
            }
        }
    }

    /// Removes the lock and bootstrap files, whichever exist. Both removals are
    /// attempted; the first failure is returned.
    pub fn unlock(&self) -> io::Result<()> {
        let lock = remove_file_if_exists(&self.lock_path());
        let bootstrap = remove_file_if_exists(&self.bootstrap_path());
        lock.and(bootstrap)
    }

    pub fn remove(&self) -> io::Result<()> {
        remove_dir_if_exists(&self.dir())
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::ErrorKind;

    #[test]
    fn derived_paths() {
        let workspace = Workspace::new("/tmp/ws", "build");
        assert_eq!(workspace.dir(), PathBuf::from("/tmp/ws/build"));
        assert_eq!(workspace.script_path(), PathBuf::from("/tmp/ws/build/build.sh"));
        assert_eq!(workspace.log_path(), PathBuf::from("/tmp/ws/build/build.txt"));
        assert_eq!(workspace.lock_path(), PathBuf::from("/tmp/ws/build/.task.lock"));
        assert_eq!(
            workspace.bootstrap_path(),
            PathBuf::from("/tmp/ws/build/.bootstrap.sh")
        );
    }

    #[test]
    fn recreate_discards_previous_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "job");
        workspace.recreate().unwrap();
        fs::write(workspace.dir().join("leftover"), "x").unwrap();

        workspace.recreate().unwrap();
        assert!(workspace.dir().is_dir());
        assert!(!workspace.dir().join("leftover").exists());
    }

    #[test]
    fn second_lock_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "job");
        workspace.recreate().unwrap();

        workspace.lock().unwrap();
        assert!(workspace.is_locked());
        let err = workspace.lock().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkspaceLocked);

        workspace.unlock().unwrap();
        assert!(!workspace.is_locked());
        workspace.unlock().unwrap();
    }

    #[test]
    fn unlock_reports_failure_but_still_removes_bootstrap() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "job");
        workspace.recreate().unwrap();
        fs::create_dir(workspace.lock_path()).unwrap();
        fs::write(workspace.bootstrap_path(), "exit 0\n").unwrap();

        assert!(workspace.unlock().is_err());
        assert!(!workspace.bootstrap_path().exists());
        assert!(workspace.is_locked());
    }

    #[test]
    fn remove_missing_directory_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "never-ran");
        workspace.remove().unwrap();
    }
}
