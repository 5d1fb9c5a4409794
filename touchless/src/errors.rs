//! Error types for the touchless provisioning pipeline.
//!
//! The taxonomy separates "the work failed" ([`StageError`]) from "the
//! machinery around the work failed" ([`PersistenceError`], [`RemedyError`]),
//! so the remediation decision point in the runner is an explicit branch.

use std::path::PathBuf;
use thiserror::Error;

/// An external command could not be launched at all.
///
/// A non-zero exit code is *not* an `ExecutionError`; it is reported in
/// [`CommandResult::exit_code`](crate::exec::CommandResult) for the caller
/// to interpret.
#[derive(Debug, Error)]
#[error("failed to launch `{program}`: {source}")]
pub struct ExecutionError {
    /// The program that could not be started.
    pub program: String,
    /// The underlying OS error.
    #[source]
    pub source: std::io::Error,
}

/// A stage's own work failed.
#[derive(Debug, Error)]
pub enum StageError {
    /// An external command could not be launched.
    #[error(transparent)]
    Launch(#[from] ExecutionError),

    /// An external command ran but exited non-zero.
    #[error("`{program}` exited with code {code}: {stderr}")]
    CommandFailed {
        /// The program that failed.
        program: String,
        /// Its exit code.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Stage-local filesystem work failed (e.g. writing a credentials file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other stage failure.
    #[error("{0}")]
    Other(String),
}

/// Resume state could not be read or written durably.
///
/// Treated as fatal by the runner: proceeding without a durable resume
/// point risks re-running destructive stages from index 0 after a crash.
#[derive(Debug, Error)]
#[error("resume state at {}: {source}", .path.display())]
pub struct PersistenceError {
    /// The resume file involved.
    pub path: PathBuf,
    /// The underlying OS error.
    #[source]
    pub source: std::io::Error,
}

/// Remediation could not even be attempted.
///
/// "The fix did not work" is *not* a `RemedyError`; that is a normal
/// [`RemediationAttempt`](crate::remedy::RemediationAttempt) with
/// `fixed == false`.
#[derive(Debug, Error)]
pub enum RemedyError {
    /// The advisor API key environment variable is not set.
    #[error("advisor credentials missing: {0} is not set")]
    MissingCredentials(String),

    /// The reasoning service could not be reached or replied with an error.
    #[error("advisor request failed: {0}")]
    Advisor(#[from] reqwest::Error),

    /// The durable journal could not be written.
    #[error("journal write failed: {0}")]
    Journal(#[source] std::io::Error),

    /// The fix script could not be persisted.
    #[error("fix script could not be written: {0}")]
    Script(#[source] std::io::Error),

    /// The shell for the fix script could not be launched.
    #[error(transparent)]
    Launch(#[from] ExecutionError),
}

/// Top-level failure of a pipeline run.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A stage failed and remediation did not fix it.
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        /// The failed stage.
        stage: String,
        /// The stage's own error, re-raised after remediation failed.
        #[source]
        source: StageError,
    },

    /// Remediation for a failed stage could not be attempted at all.
    #[error("remediation for `{stage}` failed: {source}")]
    Remedy {
        /// The stage whose remediation broke down.
        stage: String,
        /// What went wrong in the remediation machinery.
        #[source]
        source: RemedyError,
    },

    /// The resume point could not be persisted.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_names_the_program() {
        let err = ExecutionError {
            program: "frobnicate".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let message = err.to_string();
        assert!(message.contains("frobnicate"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn stage_error_wraps_launch_failure() {
        let launch = ExecutionError {
            program: "reg".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let err: StageError = launch.into();
        assert!(matches!(err, StageError::Launch(_)));
    }

    #[test]
    fn deploy_error_reports_the_stage() {
        let err = DeployError::Stage {
            stage: "Prereqs".to_string(),
            source: StageError::CommandFailed {
                program: "choco".to_string(),
                code: 2,
                stderr: "package not found".to_string(),
            },
        };
        assert!(err.to_string().contains("Prereqs"));
    }
}
