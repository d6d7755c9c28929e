use std::{
    collections::HashMap,
    env,
    path::{Path, PathBuf},
};

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/sbin";
const FALLBACK_HOME: &str = "/root";

/// Interpreter used to launch a task's script, plus the environment it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    launch_path: PathBuf,
    environment: Option<HashMap<String, String>>,
}

impl Language {
    pub fn new(launch_path: impl Into<PathBuf>) -> Self {
        Self {
            launch_path: launch_path.into(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn bash() -> Self {
        Self::new("/bin/bash").with_environment(inherited_environment())
    }

    pub fn ksh() -> Self {
        Self::new("/bin/ksh").with_environment(inherited_environment())
    }

    pub fn sh() -> Self {
        Self::new("/bin/sh").with_environment(inherited_environment())
    }

    pub fn launch_path(&self) -> &Path {
        &self.launch_path
    }

    pub fn environment(&self) -> Option<&HashMap<String, String>> {
        self.environment.as_ref()
    }
}

fn inherited_environment() -> HashMap<String, String> {
    let mut environment = HashMap::new();
    environment.insert(
        "PATH".to_string(),
        env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string()),
    );
    environment.insert(
        "HOME".to_string(),
        env::var("HOME").unwrap_or_else(|_| FALLBACK_HOME.to_string()),
    );
    environment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_carry_path_and_home() {
        for language in [Language::bash(), Language::ksh(), Language::sh()] {
            let environment = language.environment().unwrap();
            assert!(environment.contains_key("PATH"));
            assert!(environment.contains_key("HOME"));
        }
        assert_eq!(Language::sh().launch_path(), Path::new("/bin/sh"));
        assert_eq!(Language::bash().launch_path(), Path::new("/bin/bash"));
    }

    #[test]
    fn bare_language_has_no_environment() {
        let language = Language::new("/usr/bin/env");
        assert!(language.environment().is_none());
    }
}
