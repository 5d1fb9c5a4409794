//! Automated remediation of failed stages.
//!
//! When a stage fails, the engine journals the failure, asks the advisor
//! for a corrective script, persists it next to the journal, runs it under
//! the configured shell, and, if it exits 0, schedules a host restart.
//! "The fix did not work" is a normal outcome, not an error; only the
//! machinery breaking down (journal IO, advisor transport, shell launch)
//! surfaces as [`RemedyError`].

use crate::advisor::{Advisor, ReplyItem};
use crate::config::HostShell;
use crate::errors::RemedyError;
use crate::exec::{CommandRunner, CommandSpec};
use crate::journal::Journal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// How a remediation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemedyOutcome {
    /// The script exited 0; a host restart has been scheduled.
    Fixed,
    /// The script exited non-zero, or was never run (`exit_code: None`)
    /// because the advisor supplied no script.
    NotFixed {
        /// Exit code of the fix script, if it ran at all.
        exit_code: Option<i32>,
    },
}

/// Record of one remediation attempt for one stage failure.
#[derive(Debug, Clone)]
pub struct RemediationAttempt {
    /// The failed stage.
    pub stage: String,
    /// The error text that was sent to the advisor.
    pub error_text: String,
    /// The script the advisor supplied (possibly empty).
    pub script: String,
    /// Where the script was persisted for inspection.
    pub script_path: PathBuf,
    /// How the attempt ended.
    pub outcome: RemedyOutcome,
}

impl RemediationAttempt {
    /// Whether the fix script reported success.
    #[must_use]
    pub fn fixed(&self) -> bool {
        self.outcome == RemedyOutcome::Fixed
    }
}

/// Obtains and executes corrective scripts for failed stages.
pub struct RemediationEngine {
    journal: Arc<Journal>,
    advisor: Arc<dyn Advisor>,
    runner: Arc<dyn CommandRunner>,
    shell: HostShell,
    reboot: Option<CommandSpec>,
}

impl RemediationEngine {
    /// Creates an engine. No restart is scheduled unless
    /// [`with_reboot`](Self::with_reboot) configures one.
    #[must_use]
    pub fn new(
        journal: Arc<Journal>,
        advisor: Arc<dyn Advisor>,
        runner: Arc<dyn CommandRunner>,
        shell: HostShell,
    ) -> Self {
        Self {
            journal,
            advisor,
            runner,
            shell,
            reboot: None,
        }
    }

    /// Configures the restart command run after a successful fix.
    #[must_use]
    pub fn with_reboot(mut self, command: CommandSpec) -> Self {
        self.reboot = Some(command);
        self
    }

    /// Attempts to fix `stage` after it failed with `error`.
    ///
    /// The failure is journaled before anything else, so the journal holds
    /// a durable record even if the advisor is unreachable. Repeated
    /// attempts for the same stage overwrite the same fix-script file.
    pub async fn attempt_fix(
        &self,
        stage: &str,
        error: &str,
    ) -> Result<RemediationAttempt, RemedyError> {
        self.journal
            .append(&format!("error at {stage}: {error}"))
            .await
            .map_err(RemedyError::Journal)?;

        let items = self.advisor.propose_fix(stage, error).await?;

        let mut script: Option<String> = None;
        for item in items {
            match item {
                ReplyItem::ToolInvocation { kind, id, status } => {
                    info!(stage, tool = %kind, %id, %status, "advisor invoked a tool");
                    self.journal
                        .append(&format!("advisor tool call for {stage}: {kind} {id} ({status})"))
                        .await
                        .map_err(RemedyError::Journal)?;
                }
                ReplyItem::Message { text } => {
                    if script.is_none() {
                        script = Some(text);
                    }
                }
            }
        }
        let script = script.unwrap_or_default();

        let script_path = self.journal.fix_script_path(stage, &self.shell.extension);
        tokio::fs::write(&script_path, &script)
            .await
            .map_err(RemedyError::Script)?;

        if script.trim().is_empty() {
            self.journal
                .append(&format!("advisor returned no script for {stage}"))
                .await
                .map_err(RemedyError::Journal)?;
            return Ok(RemediationAttempt {
                stage: stage.to_string(),
                error_text: error.to_string(),
                script,
                script_path,
                outcome: RemedyOutcome::NotFixed { exit_code: None },
            });
        }

        let invocation = self.shell.command_for(&script_path);
        let result = self.runner.run(&invocation).await?;

        self.journal
            .append(&format!(
                "fix script for {stage} exited {}:\n{}",
                result.exit_code,
                result.combined_output()
            ))
            .await
            .map_err(RemedyError::Journal)?;

        let outcome = if result.success() {
            self.schedule_restart(stage).await;
            RemedyOutcome::Fixed
        } else {
            RemedyOutcome::NotFixed {
                exit_code: Some(result.exit_code),
            }
        };

        Ok(RemediationAttempt {
            stage: stage.to_string(),
            error_text: error.to_string(),
            script,
            script_path,
            outcome,
        })
    }

    /// Runs the configured restart command. The fix already succeeded, so
    /// a restart failure is journaled but does not change the outcome.
    async fn schedule_restart(&self, stage: &str) {
        let Some(reboot) = &self.reboot else {
            return;
        };
        info!(stage, command = %reboot.display_line(), "scheduling host restart");
        match self.runner.run(reboot).await {
            Ok(result) if result.success() => {}
            Ok(result) => {
                warn!(stage, exit_code = result.exit_code, "restart command exited non-zero");
                let _ = self
                    .journal
                    .append(&format!(
                        "restart command for {stage} exited {}",
                        result.exit_code
                    ))
                    .await;
            }
            Err(err) => {
                warn!(stage, %err, "restart command could not be launched");
                let _ = self
                    .journal
                    .append(&format!("restart command for {stage} failed: {err}"))
                    .await;
            }
        }
    }
}
