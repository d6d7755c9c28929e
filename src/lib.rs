//! Run shell scripts as managed tasks.
//!
//! A [`Task`] writes its script into `<workspace>/<name>/`, guards the
//! directory with a lock file, launches the interpreter against a generated
//! bootstrap wrapper that captures output into a log file, and reports how the
//! script ended.
//!
//! ```no_run
//! use shell_task::{Language, Outcome, ScriptExt, Task};
//!
//! let task = Task::new(Language::bash(), "echo hello").name("greet");
//! assert_eq!(task.run().unwrap(), Outcome::Success);
//! assert_eq!(task.read_log().unwrap(), "hello");
//!
//! let (result, log) = "uname -s".run_as_bash();
//! ```

pub mod app;
pub mod manager;
pub mod models;
pub mod worker;

pub use app::report::{Category, Reporter};
pub use app::script::{JoinScript, ScriptExt, ScriptRun};
pub use manager::task::Task;
pub use manager::workspace::Workspace;
pub use models::config::{LogFormat, Output, Palette, TaskConfig};
pub use models::error::{ErrorKind, TaskError, TaskResult};
pub use models::hooks::{Bootstrap, BootstrapContext, ContentHook, ShellBootstrap};
pub use models::language::Language;
pub use models::message::TaskEvent;
pub use models::task::{Outcome, TaskState};
