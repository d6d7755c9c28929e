//! Console sink for task lifecycle lines.
//!
//! Lines look like `[2024-01-01 12:00:00] >> [build] Done in 0.42s!` and are
//! colored per category. Every line also goes to the `log` facade, whether or
//! not console printing is enabled.

use std::{
    fmt::Display,
    io::{self, Write},
};

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, Local,
};
use crossterm::style::{Color, Stylize};
use log::{error, info, warn};

use crate::models::config::{LogFormat, Palette, TaskConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    name: String,
    enabled: bool,
    format: LogFormat,
    palette: Palette,
}

impl Reporter {
    /// Falls back to the default timestamp pattern when the configured one is
    /// not valid strftime.
    pub fn new(name: impl Into<String>, config: &TaskConfig) -> Self {
        let mut format = config.log_format.clone();
        if !is_valid_timestamp(&format.timestamp) {
            warn!(
                target: "shell_task",
                "Invalid log timestamp format '{}', using the default",
                format.timestamp
            );
            format.timestamp = LogFormat::default().timestamp;
        }
        Self {
            name: name.into(),
            enabled: config.print_task_info,
            format,
            palette: config.palette,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn info(&self, message: impl Display) {
        self.emit(Category::Info, message);
    }

    pub fn success(&self, message: impl Display) {
        self.emit(Category::Success, message);
    }

    pub fn error(&self, message: impl Display) {
        self.emit(Category::Error, message);
    }

    pub fn render(&self, category: Category, message: &str, now: DateTime<Local>) -> String {
        let timestamp = format!("[{}] ", now.format(&self.format.timestamp));
        let body = format!(">> [{}] {}", self.name, message);
        if !self.format.colored {
            return format!("{timestamp}{body}");
        }
        format!(
            "{}{}",
            timestamp.with(self.palette.timestamp),
            body.with(self.color(category))
        )
    }

    fn color(&self, category: Category) -> Color {
        match category {
            Category::Info => self.palette.info,
            Category::Success => self.palette.success,
            Category::Error => self.palette.error,
        }
    }

    fn emit(&self, category: Category, message: impl Display) {
        let message = message.to_string();
        match category {
            Category::Info | Category::Success => {
                info!(target: "shell_task", "[{}] {}", self.name, message)
            }
            Category::Error => error!(target: "shell_task", "[{}] {}", self.name, message),
        }

        if !self.enabled {
            return;
        }
        let line = self.render(category, &message, Local::now());
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    }
}

fn is_valid_timestamp(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}
