//! External command execution
//!
//! The pipeline never spawns `docker` directly; every invocation goes
//! through the [`Executor`] trait so the CLI can swap in the dry-run and
//! no-op variants.

use std::io::{self, Write};
use std::process::{Command, ExitStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to execute command `{}`: {source}", render_command(command, args))]
    Invoke {
        command: String,
        args: Vec<String>,
        source: io::Error,
    },

    #[error("command `{}` exited with {status}", render_command(command, args))]
    Failed {
        command: String,
        args: Vec<String>,
        status: ExitStatus,
    },

    #[error("failed to write command output")]
    Sink(#[source] io::Error),
}

fn render_command(command: &str, args: &[String]) -> String {
    let mut rendered = command.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

fn owned_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Runs an external command, writing its output to the supplied sink
pub trait Executor {
    fn run(&self, out: &mut dyn Write, command: &str, args: &[&str]) -> Result<(), ExecError>;
}

/// Executes the command for real, forwarding stdout and stderr to the sink
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExecutor;

impl Executor for CommandExecutor {
    fn run(&self, out: &mut dyn Write, command: &str, args: &[&str]) -> Result<(), ExecError> {
        let output = Command::new(command)
            .args(args)
            .output()
            .map_err(|source| ExecError::Invoke {
                command: command.to_string(),
                args: owned_args(args),
                source,
            })?;
        out.write_all(&output.stdout).map_err(ExecError::Sink)?;
        out.write_all(&output.stderr).map_err(ExecError::Sink)?;
        if !output.status.success() {
            return Err(ExecError::Failed {
                command: command.to_string(),
                args: owned_args(args),
                status: output.status,
            });
        }
        Ok(())
    }
}

/// Writes the command line to the sink without running anything (dry-run)
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintExecutor;

impl Executor for PrintExecutor {
    fn run(&self, out: &mut dyn Write, command: &str, args: &[&str]) -> Result<(), ExecError> {
        writeln!(out, "{} {}", command, args.join(" ")).map_err(ExecError::Sink)
    }
}

/// Succeeds without running or printing anything
///
/// Used for builds pulled in purely as dependencies under `--no-deps`: they
/// still flow through the pipeline so their tags get recorded, but no
/// external command runs for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn run(&self, _out: &mut dyn Write, _command: &str, _args: &[&str]) -> Result<(), ExecError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_executor_forwards_stdout_and_stderr() {
        let mut out = Vec::new();

        CommandExecutor
            .run(&mut out, "sh", &["-c", "echo visible; echo hidden 1>&2"])
            .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("visible"));
        assert!(output.contains("hidden"));
    }

    #[test]
    fn command_executor_reports_nonzero_exit_with_command_line() {
        let mut out = Vec::new();

        let err = CommandExecutor
            .run(&mut out, "sh", &["-c", "exit 3"])
            .unwrap_err();

        assert!(err.to_string().contains("`sh -c exit 3`"));
        assert!(matches!(err, ExecError::Failed { .. }));
    }

    #[test]
    fn command_executor_reports_missing_binary() {
        let mut out = Vec::new();

        let err = CommandExecutor
            .run(&mut out, "bakery-no-such-binary", &["arg"])
            .unwrap_err();

        assert!(matches!(err, ExecError::Invoke { .. }));
        assert!(err.to_string().contains("bakery-no-such-binary arg"));
    }

    #[test]
    fn print_executor_writes_the_command_line() {
        let mut out = Vec::new();

        PrintExecutor
            .run(&mut out, "docker", &["push", "foo:latest"])
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "docker push foo:latest\n");
    }

    #[test]
    fn noop_executor_writes_nothing() {
        let mut out = Vec::new();

        NoopExecutor
            .run(&mut out, "docker", &["push", "foo:latest"])
            .unwrap();

        assert!(out.is_empty());
    }
}
