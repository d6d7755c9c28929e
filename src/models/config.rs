use std::{env, path::PathBuf};

use crossterm::style::Color;
use log::warn;

/// Where the output of a running script ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    /// Redirected into the task's log file only.
    #[default]
    Log,
    /// Written to the log file and echoed to the console.
    Console,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFormat {
    /// chrono strftime pattern for the bracketed timestamp.
    pub timestamp: String,
    pub colored: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            timestamp: "%Y-%m-%d %H:%M:%S".to_string(),
            colored: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub timestamp: Color,
    pub info: Color,
    pub success: Color,
    pub error: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            timestamp: Color::Blue,
            info: Color::Cyan,
            success: Color::Green,
            error: Color::Red,
        }
    }
}

/// Settings handed to every task at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub output: Output,
    pub name: String,
    pub workspace: PathBuf,
    pub print_task_info: bool,
    pub log_format: LogFormat,
    pub palette: Palette,
    pub trim_trailing_newline: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            output: Output::default(),
            name: "Default".to_string(),
            workspace: env::temp_dir().join("shell_task"),
            print_task_info: true,
            log_format: LogFormat::default(),
            palette: Palette::default(),
            trim_trailing_newline: true,
        }
    }
}

impl TaskConfig {
    /// Defaults overlaid with `SHELL_TASK_*` and `NO_COLOR` from the process
    /// environment. Meant for embedding binaries that build one config at
    /// startup and hand it to every `Task::with_config`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(workspace) = lookup("SHELL_TASK_WORKSPACE").filter(|v| !v.is_empty()) {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(name) = lookup("SHELL_TASK_NAME").filter(|v| !v.is_empty()) {
            config.name = name;
        }
        if let Some(output) = lookup("SHELL_TASK_OUTPUT") {
            match output.trim().to_ascii_lowercase().as_str() {
                "log" => config.output = Output::Log,
                "console" => config.output = Output::Console,
                other => warn!(target: "shell_task", "Ignoring unknown SHELL_TASK_OUTPUT '{}'", other),
            }
        }
        if let Some(quiet) = lookup("SHELL_TASK_QUIET") {
            if !quiet.is_empty() && quiet != "0" {
                config.print_task_info = false;
            }
        }
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            config.log_format.colored = false;
        }

        config
    }
}
