use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Instant, SystemTime},
};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};

use crate::app::report::Reporter;
use crate::manager::workspace::Workspace;
use crate::models::{
    config::{Output, TaskConfig},
    error::{TaskError, TaskResult},
    hooks::{Bootstrap, BootstrapContext, ContentHook, ShellBootstrap},
    language::Language,
    message::TaskEvent,
    task::{Outcome, TaskState},
};
use crate::worker::worker::{self, Launch};

struct OwnedProcess {
    pid: u32,
    started_at: SystemTime,
    started: Instant,
}

/// One managed script invocation with its own workspace, lock, script and log.
///
/// All lifecycle methods take `&self`, so a task shared through an `Arc` can
/// block in [`Task::run`] on one thread while another thread calls
/// [`Task::terminate`] or [`Task::close`].
pub struct Task {
    language: Language,
    output: Output,
    workspace: Workspace,
    content: String,
    environment: HashMap<String, String>,
    configure: Option<Arc<dyn ContentHook>>,
    bootstrap: Arc<dyn Bootstrap>,
    trim_trailing_newline: bool,
    reporter: Reporter,

    running: AtomicBool,
    state: Mutex<TaskState>,
    process: Mutex<Option<OwnedProcess>>,
    subscribers: Mutex<Vec<Sender<TaskEvent>>>,
}

impl Task {
    pub fn new(language: Language, content: impl Into<String>) -> Self {
        Self::with_config(language, content, &TaskConfig::default())
    }

    pub fn with_config(language: Language, content: impl Into<String>, config: &TaskConfig) -> Self {
        Self {
            language,
            output: config.output,
            workspace: Workspace::new(&config.workspace, config.name.clone()),
            content: content.into(),
            environment: HashMap::new(),
            configure: None,
            bootstrap: Arc::new(ShellBootstrap),
            trim_trailing_newline: config.trim_trailing_newline,
            reporter: Reporter::new(config.name.clone(), config),
            running: AtomicBool::new(false),
            state: Mutex::new(TaskState::Idle),
            process: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.workspace = Workspace::new(self.workspace.root(), name.clone());
        self.reporter.set_name(name);
        self
    }

    pub fn workspace(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace = Workspace::new(root, self.workspace.name());
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    pub fn print_task_info(mut self, enabled: bool) -> Self {
        self.reporter.set_enabled(enabled);
        self
    }

    /// Hook applied to the script body right before it is written.
    pub fn configure(mut self, hook: impl ContentHook + 'static) -> Self {
        self.configure = Some(Arc::new(hook));
        self
    }

    /// Replaces the default [`ShellBootstrap`] wrapper generator.
    pub fn bootstrap(mut self, bootstrap: impl Bootstrap + 'static) -> Self {
        self.bootstrap = Arc::new(bootstrap);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn task_name(&self) -> &str {
        self.workspace.name()
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace.dir()
    }

    pub fn log_path(&self) -> PathBuf {
        self.workspace.log_path()
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TaskState {
        *lock(&self.state)
    }

    pub fn pid(&self) -> Option<u32> {
        lock(&self.process).as_ref().map(|p| p.pid)
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        lock(&self.process).as_ref().map(|p| p.started_at)
    }

    /// Receives a `Started` and a `Finished` event for every run that gets
    /// past the running and lock guards.
    pub fn subscribe(&self) -> Receiver<TaskEvent> {
        let (sender, receiver) = unbounded();
        lock(&self.subscribers).push(sender);
        receiver
    }

    /// Writes the script into a fresh workspace, runs it and blocks until it exits.
    pub fn run(&self) -> TaskResult<Outcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.reporter.error("Task is already running.");
            return Err(TaskError::AlreadyRunning);
        }

        if self.workspace.is_locked() {
            self.running.store(false, Ordering::SeqCst);
            self.reporter.error("Workspace is locked.");
            return Err(TaskError::WorkspaceLocked {
                path: self.workspace.lock_path(),
            });
        }

        let result = {
            let mut finalizer = Finalizer {
                task: self,
                locked: false,
            };
            self.execute(&mut finalizer)
        };

        self.broadcast(TaskEvent::Finished(
            result.as_ref().map(|outcome| *outcome).map_err(TaskError::kind),
        ));
        result
    }

    fn execute(&self, finalizer: &mut Finalizer<'_>) -> TaskResult<Outcome> {
        self.set_state(TaskState::Locking);
        self.workspace
            .recreate()
            .map_err(|err| self.fail("Failed to create workspace.", err))?;
        self.workspace
            .lock()
            .map_err(|err| self.fail("Workspace is locked.", err))?;
        finalizer.locked = true;

        self.set_state(TaskState::Preparing);
        let dir = self.workspace.dir();
        let log_path = self.workspace.log_path();
        let script_path = self.workspace.script_path();
        let bootstrap_path = self.workspace.bootstrap_path();

        fs::File::create(&log_path)
            .map_err(TaskError::create(&log_path))
            .map_err(|err| self.fail("Failed to create log file.", err))?;

        let content = match &self.configure {
            Some(hook) => hook.apply(&self.content),
            None => self.content.clone(),
        };
        fs::write(&script_path, content)
            .map_err(TaskError::create(&script_path))
            .map_err(|err| self.fail("Failed to create script file.", err))?;

        let wrapper = self.bootstrap.render(&BootstrapContext {
            launch_path: self.language.launch_path(),
            script_path: &script_path,
            log_path: &log_path,
            output: self.output,
        });
        fs::write(&bootstrap_path, wrapper)
            .map_err(TaskError::create(&bootstrap_path))
            .map_err(|err| self.fail("Failed to create bootstrap file.", err))?;

        let program = self.language.launch_path();
        let launch = Launch {
            program,
            script: &bootstrap_path,
            dir: &dir,
            environment: worker::merge_environment(&self.language, &self.environment),
        };
        let mut child = worker::spawn(&launch).map_err(|source| {
            self.fail(
                "Failed to launch task.",
                TaskError::LaunchFailed {
                    program: program.to_path_buf(),
                    source,
                },
            )
        })?;

        let pid = child.id();
        *lock(&self.process) = Some(OwnedProcess {
            pid,
            started_at: SystemTime::now(),
            started: Instant::now(),
        });
        self.set_state(TaskState::Running);
        self.reporter.info(format_args!("Task is running at {pid}..."));
        self.broadcast(TaskEvent::Started { pid });

        let waited = child.wait();
        let owned = lock(&self.process).take();
        self.set_state(TaskState::Finalizing);

        let duration = owned
            .map(|p| format!("{:.2}", p.started.elapsed().as_secs_f64()))
            .unwrap_or_else(|| "unknown".to_string());

        let status = waited.map_err(|source| {
            self.fail(
                "Failed to wait for task.",
                TaskError::LaunchFailed {
                    program: program.to_path_buf(),
                    source,
                },
            )
        })?;

        let outcome = Outcome::from_status(status);
        match outcome {
            Outcome::Failed(code) => self
                .reporter
                .error(format_args!("Task failed with code {code} in {duration}s!")),
            Outcome::Success => self.reporter.success(format_args!("Done in {duration}s!")),
        }
        Ok(outcome)
    }

    /// Asks the running script to exit. Does not wait.
    ///
    /// With [`Output::Log`] the owned pid is the script itself and only it is
    /// signalled; its children are left alone. With [`Output::Console`] the
    /// script sits behind the wrapper's `tee` pipeline, so the run's whole
    /// process group is signalled instead.
    pub fn terminate(&self) {
        let Some(pid) = self.pid() else {
            return;
        };
        let delivered = match self.output {
            Output::Log => worker::terminate(pid),
            Output::Console => worker::terminate_group(pid),
        };
        if !delivered {
            debug!(target: "shell_task", "SIGTERM to {} was not delivered", pid);
        }
    }

    /// Removes the task's workspace directory. Does nothing while running.
    pub fn clean(&self) {
        if self.is_running() {
            return;
        }
        if let Err(err) = self.workspace.remove() {
            debug!(
                target: "shell_task",
                "Ignoring failure to remove {}: {}",
                self.workspace.dir().display(),
                err
            );
        }
    }

    pub fn read_log(&self) -> TaskResult<String> {
        self.read_log_with(self.trim_trailing_newline)
    }

    /// Reads the whole log, optionally dropping exactly one trailing newline.
    pub fn read_log_with(&self, trim_trailing_newline: bool) -> TaskResult<String> {
        let path = self.workspace.log_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(source) => {
                self.reporter.error("Failed to open log file.");
                return Err(TaskError::OpenLogFailed { path, source });
            }
        };

        let mut content = String::from_utf8_lossy(&bytes).into_owned();
        if trim_trailing_newline && content.ends_with('\n') {
            content.pop();
        }
        Ok(content)
    }

    /// Tears down a live run: SIGKILLs the direct children of the owned
    /// process through a companion reaper task, then SIGTERMs the run's
    /// process group, which holds the wrapper, the script and any descendant
    /// that did not start a group of its own.
    ///
    /// Safe to call at any time; does nothing when no process is owned.
    pub fn close(&self) {
        let Some(pid) = self.pid() else {
            return;
        };

        let reaper = Task::new(Language::sh(), worker::reaper_script(pid))
            .name(format!(".task_killer_{}", self.task_name()))
            .workspace(self.workspace.root())
            .print_task_info(false);
        match reaper.run() {
            Ok(Outcome::Success) => {}
            Ok(outcome) => warn!(target: "shell_task", "Reaper for {} ended with {:?}", pid, outcome),
            Err(err) => warn!(target: "shell_task", "Reaper for {} did not run: {}", pid, err),
        }
        reaper.clean();

        if !worker::terminate_group(pid) {
            debug!(target: "shell_task", "SIGTERM to group {} was not delivered", pid);
        }
    }

    fn fail(&self, message: &str, err: TaskError) -> TaskError {
        self.reporter.error(message);
        debug!(target: "shell_task", "{}", err);
        err
    }

    fn set_state(&self, state: TaskState) {
        *lock(&self.state) = state;
    }

    fn broadcast(&self, event: TaskEvent) {
        lock(&self.subscribers).retain(|sender| sender.send(event.clone()).is_ok());
    }
}

/// Dropping calls [`Task::close`], but `run()` borrows the task, so a task is
/// never dropped while it owns a live process. Call `close()` on a shared task
/// to tear down a run that is still in flight.
impl Drop for Task {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs on every exit path of a run that passed the entry guards.
struct Finalizer<'a> {
    task: &'a Task,
    locked: bool,
}

impl Drop for Finalizer<'_> {
    fn drop(&mut self) {
        let task = self.task;
        task.set_state(TaskState::Finalizing);
        if self.locked {
            if let Err(err) = task.workspace.unlock() {
                task.reporter.error("Failed to unlock workspace.");
                debug!(target: "shell_task", "{}", err);
            }
        }
        task.set_state(TaskState::Idle);
        task.running.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::ErrorKind;

    fn quiet_task(root: &Path, name: &str, content: &str) -> Task {
        Task::new(Language::sh(), content)
            .name(name)
            .workspace(root)
            .print_task_info(false)
    }

    #[test]
    fn builder_places_files_under_workspace() {
        let task = Task::new(Language::sh(), "true").name("deploy").workspace("/srv/ws");
        assert_eq!(task.task_name(), "deploy");
        assert_eq!(task.workspace_dir(), PathBuf::from("/srv/ws/deploy"));
        assert_eq!(task.log_path(), PathBuf::from("/srv/ws/deploy/deploy.txt"));
        assert_eq!(task.state(), TaskState::Idle);
        assert!(task.pid().is_none());
        assert!(task.start_time().is_none());
    }

    #[test]
    fn config_supplies_defaults() {
        let config = TaskConfig {
            name: "nightly".to_string(),
            workspace: PathBuf::from("/var/tmp/jobs"),
            ..TaskConfig::default()
        };
        let task = Task::with_config(Language::sh(), "true", &config);
        assert_eq!(task.workspace_dir(), PathBuf::from("/var/tmp/jobs/nightly"));
    }

    #[test]
    fn configure_hook_rewrites_script() {
        let root = tempfile::tempdir().unwrap();
        let task = quiet_task(root.path(), "hook", "echo body")
            .configure(|content: &str| format!("echo header\n{content}\n"));

        assert_eq!(task.run().unwrap(), Outcome::Success);
        assert_eq!(task.read_log().unwrap(), "header\nbody");
        let script = fs::read_to_string(root.path().join("hook/hook.sh")).unwrap();
        assert!(script.starts_with("echo header\n"));
    }

    #[test]
    fn task_environment_overrides_language() {
        let root = tempfile::tempdir().unwrap();
        let mut defaults = HashMap::new();
        defaults.insert("GREETING".to_string(), "hello".to_string());
        defaults.insert("TARGET".to_string(), "world".to_string());
        let language = Language::new("/bin/sh").with_environment(defaults);

        let task = Task::new(language, "echo \"$GREETING $TARGET\"")
            .name("env")
            .workspace(root.path())
            .print_task_info(false)
            .env("TARGET", "there");
        assert_eq!(task.run().unwrap(), Outcome::Success);
        assert_eq!(task.read_log().unwrap(), "hello there");
    }

    #[test]
    fn missing_interpreter_is_a_launch_failure() {
        let root = tempfile::tempdir().unwrap();
        let task = Task::new(Language::new("/nonexistent/interpreter"), "true")
            .name("missing")
            .workspace(root.path())
            .print_task_info(false);

        let err = task.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LaunchFailed);
        assert!(!task.is_running());
        assert!(!root.path().join("missing/.task.lock").exists());
    }

    #[test]
    fn subscribers_see_start_and_finish() {
        let root = tempfile::tempdir().unwrap();
        let task = quiet_task(root.path(), "events", "exit 4");
        let events = task.subscribe();

        assert_eq!(task.run().unwrap(), Outcome::Failed(4));
        let received: Vec<TaskEvent> = events.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], TaskEvent::Started { pid } if pid > 0));
        assert_eq!(received[1], TaskEvent::Finished(Ok(Outcome::Failed(4))));
    }

    #[test]
    fn close_without_process_is_noop() {
        let root = tempfile::tempdir().unwrap();
        let task = quiet_task(root.path(), "idle", "true");
        task.close();
        assert!(!root.path().join(".task_killer_idle").exists());
    }
}
