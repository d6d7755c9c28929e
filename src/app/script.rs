//! One-shot helpers for running literal script text.

use crate::manager::task::Task;
use crate::models::{
    config::TaskConfig,
    error::TaskResult,
    hooks::ContentHook,
    language::Language,
    task::Outcome,
};

/// Run result paired with the captured log. The log is empty unless the
/// script succeeded.
pub type ScriptRun = (TaskResult<Outcome>, String);

pub trait ScriptExt {
    fn run_as_script(&self, language: Language) -> ScriptRun;

    fn run_as_script_with(&self, language: Language, config: &TaskConfig) -> ScriptRun;

    fn run_as_script_named(&self, language: Language, name: &str, config: &TaskConfig) -> ScriptRun;

    /// Like [`ScriptExt::run_as_script_with`], rewriting the script through
    /// `hook` before it is written.
    fn run_as_script_configured(
        &self,
        language: Language,
        config: &TaskConfig,
        hook: impl ContentHook + 'static,
    ) -> ScriptRun;

    fn run_as_bash(&self) -> ScriptRun {
        self.run_as_script(Language::bash())
    }
}

impl ScriptExt for str {
    fn run_as_script(&self, language: Language) -> ScriptRun {
        self.run_as_script_with(language, &TaskConfig::default())
    }

    fn run_as_script_with(&self, language: Language, config: &TaskConfig) -> ScriptRun {
        run_task(Task::with_config(language, self, config))
    }

    fn run_as_script_named(&self, language: Language, name: &str, config: &TaskConfig) -> ScriptRun {
        run_task(Task::with_config(language, self, config).name(name))
    }

    fn run_as_script_configured(
        &self,
        language: Language,
        config: &TaskConfig,
        hook: impl ContentHook + 'static,
    ) -> ScriptRun {
        run_task(Task::with_config(language, self, config).configure(hook))
    }
}

fn run_task(task: Task) -> ScriptRun {
    let result = task.run();
    let log = match result {
        Ok(Outcome::Success) => task.read_log().unwrap_or_default(),
        _ => String::new(),
    };
    (result, log)
}

/// Joins script fragments line by line.
pub trait JoinScript {
    fn joined_script(&self) -> String;
}

impl<S: AsRef<str>> JoinScript for [S] {
    fn joined_script(&self) -> String {
        self.iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join("\n")
    }
}
