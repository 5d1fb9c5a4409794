//! The staged provisioning pipeline.
//!
//! This module provides:
//! - The [`Stage`] trait and the collaborators stage bodies see ([`StageCx`])
//! - [`CommandStage`], a stage defined by a sequence of external commands
//! - The [`PipelineRunner`] state machine with resume and remediation

mod runner;
#[cfg(test)]
mod runner_tests;

pub use runner::{PipelineRunner, RunOutcome, RunReport};

use crate::errors::{ExecutionError, StageError};
use crate::exec::{CommandResult, CommandRunner, CommandSpec};
use crate::progress::{ProgressEvent, ProgressSink};
use async_trait::async_trait;
use std::sync::Arc;

/// Collaborators available to a stage body: command execution and
/// progress reporting. Stages need nothing else from the orchestrator.
#[derive(Clone)]
pub struct StageCx {
    runner: Arc<dyn CommandRunner>,
    progress: Arc<dyn ProgressSink>,
}

impl StageCx {
    /// Creates a context over the given runner and sink.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, progress: Arc<dyn ProgressSink>) -> Self {
        Self { runner, progress }
    }

    /// Runs one external command to completion.
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecutionError> {
        self.runner.run(spec).await
    }

    /// Reports progress for `stage`.
    pub fn report(&self, stage: &str, percent: u8, message: impl Into<String>) {
        self.progress
            .report(ProgressEvent::new(stage, percent, message));
    }
}

/// One named unit of work in the provisioning sequence.
///
/// Identity is positional: the runner persists the stage *index*, so names
/// must stay stable across versions for resume to land on the right work.
/// Stages are re-run from scratch after a crash mid-stage and must
/// tolerate partial prior execution.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The stable stage name.
    fn name(&self) -> &str;

    /// Performs the stage's work.
    async fn run(&self, cx: &StageCx) -> Result<(), StageError>;
}

/// A stage defined by an ordered list of external commands.
///
/// Commands run sequentially; the first non-zero exit fails the stage.
/// Progress is reported before each command, sweeping from 10% towards
/// 90% across the command list.
pub struct CommandStage {
    name: String,
    intro: Option<(u8, String)>,
    commands: Vec<CommandSpec>,
}

impl CommandStage {
    /// Creates an empty command stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intro: None,
            commands: Vec::new(),
        }
    }

    /// Sets a banner reported when the stage starts.
    #[must_use]
    pub fn with_intro(mut self, percent: u8, message: impl Into<String>) -> Self {
        self.intro = Some((percent, message.into()));
        self
    }

    /// Appends one command.
    #[must_use]
    pub fn command(mut self, spec: CommandSpec) -> Self {
        self.commands.push(spec);
        self
    }

    /// Appends several commands.
    #[must_use]
    pub fn commands<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = CommandSpec>,
    {
        self.commands.extend(specs);
        self
    }

    /// Number of commands in this stage.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if the stage has no commands (banner-only stages).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cx: &StageCx) -> Result<(), StageError> {
        if let Some((percent, message)) = &self.intro {
            cx.report(&self.name, *percent, message.clone());
        }

        let total = self.commands.len();
        for (i, spec) in self.commands.iter().enumerate() {
            let percent = 10 + (i + 1) * (80 / total.max(1));
            cx.report(
                &self.name,
                u8::try_from(percent).unwrap_or(100),
                spec.display_line(),
            );

            let result = cx.run(spec).await?;
            if !result.success() {
                return Err(StageError::CommandFailed {
                    program: spec.program.clone(),
                    code: result.exit_code,
                    stderr: result.stderr,
                });
            }
        }
        Ok(())
    }
}
