//! # Touchless
//!
//! An unattended, resumable server-provisioning pipeline with AI-assisted
//! remediation.
//!
//! Touchless drives a fixed sequence of privileged stages against a single
//! target machine:
//!
//! - **Staged execution**: an ordered, named stage list run strictly
//!   sequentially, one external command at a time
//! - **Crash resumption**: the index of the stage about to run is persisted
//!   before it executes, so a crash or reboot re-runs that stage
//! - **Automatic remediation**: a failed stage's error is sent to a
//!   reasoning service; the corrective script it returns is executed and,
//!   on success, the host restarts and the pipeline resumes on next boot
//! - **Durable journaling**: every failure, fix script, and command output
//!   is appended to an append-only log with timestamps
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use touchless::prelude::*;
//!
//! let config = DeployConfig::new("corp.example.com", "CORP", "dsrm-pw", "Example Corp");
//! let journal = Arc::new(Journal::create(&config.log_dir)?);
//! let advisor = Arc::new(OpenAiAdvisor::from_env(&config.advisor_model)?);
//! let exec = Arc::new(ProcessRunner::new());
//!
//! let engine = RemediationEngine::new(journal, advisor, exec.clone(), config.shell.clone())
//!     .with_reboot(config.reboot_command.clone());
//! let runner = PipelineRunner::new(
//!     provision_plan(&config),
//!     Arc::new(FileResumeStore::new(&config.resume_file)),
//!     engine,
//!     StageCx::new(exec, Arc::new(ConsoleProgressSink)),
//! );
//!
//! let report = runner.run().await?;
//! std::process::exit(report.exit_code());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod advisor;
pub mod config;
pub mod errors;
pub mod exec;
pub mod journal;
pub mod pipeline;
pub mod progress;
pub mod remedy;
pub mod resume;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::advisor::{Advisor, OpenAiAdvisor, ReplyItem};
    pub use crate::config::{DeployConfig, HostShell};
    pub use crate::errors::{
        DeployError, ExecutionError, PersistenceError, RemedyError, StageError,
    };
    pub use crate::exec::{CommandResult, CommandRunner, CommandSpec, ProcessRunner};
    pub use crate::journal::Journal;
    pub use crate::pipeline::{
        CommandStage, PipelineRunner, RunOutcome, RunReport, Stage, StageCx,
    };
    pub use crate::progress::{
        CollectingProgressSink, ConsoleProgressSink, LoggingProgressSink, NoOpProgressSink,
        ProgressEvent, ProgressSink,
    };
    pub use crate::remedy::{RemediationAttempt, RemediationEngine, RemedyOutcome};
    pub use crate::resume::{FileResumeStore, InMemoryResumeStore, ResumeStore};
    pub use crate::stages::provision_plan;
}
