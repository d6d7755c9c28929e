//! Pluggable text transformations applied while a task prepares its workspace.

use std::path::Path;

use super::config::Output;

/// Rewrites the script body right before it is written to disk.
pub trait ContentHook: Send + Sync {
    fn apply(&self, content: &str) -> String;
}

impl<F> ContentHook for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn apply(&self, content: &str) -> String {
        self(content)
    }
}

/// Everything a bootstrap generator needs to wrap the real script.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapContext<'a> {
    pub launch_path: &'a Path,
    pub script_path: &'a Path,
    pub log_path: &'a Path,
    pub output: Output,
}

/// Produces the wrapper script the interpreter is actually launched against.
///
/// The wrapper owns output capture: it must run the real script and leave its
/// combined stdout/stderr in `log_path`, exiting with the script's status.
pub trait Bootstrap: Send + Sync {
    fn render(&self, ctx: &BootstrapContext<'_>) -> String;
}

impl<F> Bootstrap for F
where
    F: Fn(&BootstrapContext<'_>) -> String + Send + Sync,
{
    fn render(&self, ctx: &BootstrapContext<'_>) -> String {
        self(ctx)
    }
}

/// POSIX sh wrapper, valid for sh, bash and ksh interpreters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellBootstrap;

impl Bootstrap for ShellBootstrap {
    fn render(&self, ctx: &BootstrapContext<'_>) -> String {
        let launch = quote(ctx.launch_path);
        let script = quote(ctx.script_path);
        let log = quote(ctx.log_path);

        match ctx.output {
            // exec keeps the wrapper pid equal to the script pid.
            Output::Log => format!("exec {launch} {script} >{log} 2>&1\n"),
            // fd 4 carries the script's exit status past the tee pipeline.
            Output::Console => format!(
                "exec 3>&1\n\
                 status=$( {{ {{ {launch} {script} 2>&1 3>&- 4>&-; echo $? >&4; }} | tee {log} >&3 4>&-; }} 4>&1 )\n\
                 exec 3>&-\n\
                 exit \"${{status:-1}}\"\n"
            ),
        }
    }
}

/// Single-quotes a path for sh.
pub fn quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}
