//! External command execution.
//!
//! [`CommandRunner`] is the seam between the pipeline and the host: stages,
//! the remediation engine, and the reboot hook all go through it, so tests
//! can substitute a scripted fake. The real implementation spawns child
//! processes and blocks until they exit, capturing output in full.

use crate::errors::ExecutionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// The program to launch.
    pub program: String,
    /// Arguments passed verbatim (no shell splitting).
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory, if different from the caller's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a spec for the given program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// One-line rendering for progress messages and journal entries.
    #[must_use]
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// The captured outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Process exit code (-1 if terminated without one).
    pub exit_code: i32,
    /// Full captured standard output.
    pub stdout: String,
    /// Full captured standard error.
    pub stderr: String,
}

impl CommandResult {
    /// Whether the command exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr concatenated, for journal entries.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Seam over process spawning.
///
/// A non-zero exit code is reported in [`CommandResult`], not as an error:
/// only the inability to launch the program at all is an [`ExecutionError`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion and captures its output.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecutionError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecutionError> {
        debug!(command = %spec.display_line(), "spawning");

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|source| ExecutionError {
            program: spec.program.clone(),
            source,
        })?;

        let result = CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %spec.display_line(),
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "command finished"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "printf OK"]);

        let result = runner.run(&spec).await.unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "OK");
        assert_eq!(result.stderr, "");
        assert!(result.success());
    }

    #[tokio::test]
    async fn run_reports_nonzero_exit_as_data() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);

        let result = runner.run(&spec).await.unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
        assert!(result.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn run_fails_only_when_the_program_cannot_launch() {
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("definitely-not-a-real-program-1f2e3d");

        let err = runner.run(&spec).await.unwrap_err();
        assert_eq!(err.program, "definitely-not-a-real-program-1f2e3d");
    }

    #[tokio::test]
    async fn run_honors_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "pwd"])
            .current_dir(dir.path());

        let result = runner.run(&spec).await.unwrap();
        let reported = result.stdout.trim();
        assert!(reported.ends_with(
            dir.path()
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
        ));
    }

    #[test]
    fn display_line_joins_program_and_args() {
        let spec = CommandSpec::new("tzutil").arg("/s").arg("Eastern Standard Time");
        assert_eq!(spec.display_line(), "tzutil /s Eastern Standard Time");
        assert_eq!(CommandSpec::new("powercfg").display_line(), "powercfg");
    }

    #[test]
    fn combined_output_merges_both_streams() {
        let result = CommandResult {
            exit_code: 0,
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
        };
        assert_eq!(result.combined_output(), "out\nerr");

        let quiet = CommandResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(quiet.combined_output(), "");
    }
}
