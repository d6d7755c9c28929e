use std::{
    collections::{BTreeMap, HashMap},
    io,
    os::unix::process::CommandExt,
    path::Path,
    process::{Child, Command},
};

use log::debug;

use crate::models::language::Language;

/// One interpreter invocation: `program script`, run from `dir`.
#[derive(Debug)]
pub struct Launch<'a> {
    pub program: &'a Path,
    pub script: &'a Path,
    pub dir: &'a Path,
    pub environment: BTreeMap<String, String>,
}

/// Builds the child environment from scratch: language defaults first, task
/// overrides last.
pub fn merge_environment(
    language: &Language,
    overrides: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let mut environment = BTreeMap::new();
    if let Some(defaults) = language.environment() {
        environment.extend(defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    environment.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    environment
}

/// Spawns the interpreter as the leader of a new process group, so the whole
/// run (wrapper, pipeline stages, script and its descendants) can be
/// signalled through the group id, which equals the returned child's pid.
pub fn spawn(launch: &Launch<'_>) -> io::Result<Child> {
    debug!(
        target: "shell_task",
        "Spawning {} {} in {}",
        launch.program.display(),
        launch.script.display(),
        launch.dir.display()
    );
    Command::new(launch.program)
        .arg(launch.script)
        .current_dir(launch.dir)
        .env_clear()
        .envs(&launch.environment)
        .process_group(0)
        .spawn()
}

/// Sends `sig` to `pid`. Returns whether the signal was delivered.
pub fn signal(pid: u32, sig: libc::c_int) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    unsafe { libc::kill(pid, sig) == 0 }
}

pub fn terminate(pid: u32) -> bool {
    signal(pid, libc::SIGTERM)
}

/// Sends `sig` to every member of process group `pgid`.
pub fn signal_group(pgid: u32, sig: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    if pgid <= 1 {
        return false;
    }
    unsafe { libc::kill(-pgid, sig) == 0 }
}

pub fn terminate_group(pgid: u32) -> bool {
    signal_group(pgid, libc::SIGTERM)
}

/// Shell text that SIGKILLs every direct child of `pid`.
///
/// Falls back to scanning `/proc` when `pkill` is not installed.
pub fn reaper_script(pid: u32) -> String {
    format!(
        "if command -v pkill >/dev/null 2>&1; then\n\
         \tpkill -9 -P {pid}\n\
         else\n\
         \tfor stat in /proc/[0-9]*/stat; do\n\
         \t\tread -r child _ _ parent _ < \"$stat\" 2>/dev/null || continue\n\
         \t\t[ \"$parent\" = {pid} ] && kill -9 \"$child\"\n\
         \tdone\n\
         fi\n\
         exit 0\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_overrides_win() {
        let mut defaults = HashMap::new();
        defaults.insert("PATH".to_string(), "/bin".to_string());
        defaults.insert("HOME".to_string(), "/root".to_string());
        let language = Language::new("/bin/sh").with_environment(defaults);

        let mut overrides = HashMap::new();
        overrides.insert("HOME".to_string(), "/home/build".to_string());
        overrides.insert("STAGE".to_string(), "ci".to_string());

        let environment = merge_environment(&language, &overrides);
        assert_eq!(environment["PATH"], "/bin");
        assert_eq!(environment["HOME"], "/home/build");
        assert_eq!(environment["STAGE"], "ci");
        assert_eq!(environment.len(), 3);
    }

    #[test]
    fn reaper_targets_direct_children() {
        let script = reaper_script(4242);
        assert!(script.contains("pkill -9 -P 4242"));
        assert!(script.contains("[ \"$parent\" = 4242 ]"));
    }

    #[test]
    fn signal_rejects_invalid_pids() {
        assert!(!signal(0, 0));
        assert!(!signal(u32::MAX, 0));
    }

    #[test]
    fn signal_group_rejects_invalid_groups() {
        assert!(!signal_group(0, 0));
        assert!(!signal_group(1, 0));
        assert!(!signal_group(u32::MAX, 0));
    }

    #[test]
    fn spawned_child_leads_its_own_group() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("group.sh");
        std::fs::write(&script, "sleep 30\n").unwrap();

        let mut child = spawn(&Launch {
            program: Path::new("/bin/sh"),
            script: &script,
            dir: dir.path(),
            environment: BTreeMap::new(),
        })
        .unwrap();
        let pid = child.id();
        let pgid = unsafe { libc::getpgid(pid as libc::pid_t) };
        assert_eq!(pgid, pid as libc::pid_t);

        assert!(terminate_group(pid));
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn spawn_runs_in_directory_with_clean_environment() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("probe.sh");
        std::fs::write(&script, "[ \"$(pwd -P)\" = \"$EXPECTED\" ] && [ -z \"$HOME\" ]\n").unwrap();

        let mut environment = BTreeMap::new();
        environment.insert(
            "EXPECTED".to_string(),
            dir.path().canonicalize().unwrap().display().to_string(),
        );

        let mut child = spawn(&Launch {
            program: Path::new("/bin/sh"),
            script: &script,
            dir: dir.path(),
            environment,
        })
        .unwrap();
        assert!(child.wait().unwrap().success());
    }
}
