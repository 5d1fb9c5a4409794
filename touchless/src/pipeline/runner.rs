//! The pipeline state machine.
//!
//! States are stage indices `0..=N`; `N` marks completion. The runner
//! persists the index *before* executing each stage (write-before-execute),
//! so a crash mid-stage resumes by re-running that stage, never skipping
//! it. On failure the remediation engine gets one shot; a successful fix
//! stops the run and leaves the reboot + persisted index to continue it.

use super::{Stage, StageCx};
use crate::errors::DeployError;
use crate::progress::ProgressEvent;
use crate::remedy::RemediationEngine;
use crate::resume::ResumeStore;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// How a pipeline run ended, short of an unrecoverable error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every remaining stage ran to completion.
    Completed,
    /// A stage failed, the fix script succeeded, and a restart was
    /// scheduled. The run itself still counts as failed: the persisted
    /// index re-runs the stage on next boot.
    RemediationScheduled {
        /// The stage that failed and was remediated.
        stage: String,
    },
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier stamped on this run's log records.
    pub run_id: Uuid,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Number of stages that completed during this run.
    pub stages_run: usize,
}

impl RunReport {
    /// Whether the whole pipeline is done.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Process exit code for this report: 0 only on full completion.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }
}

/// Executes the ordered stage sequence with resume and remediation.
pub struct PipelineRunner {
    stages: Vec<Arc<dyn Stage>>,
    resume: Arc<dyn ResumeStore>,
    remedy: RemediationEngine,
    cx: StageCx,
}

impl PipelineRunner {
    /// Creates a runner over `stages`.
    #[must_use]
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        resume: Arc<dyn ResumeStore>,
        remedy: RemediationEngine,
        cx: StageCx,
    ) -> Self {
        Self {
            stages,
            resume,
            remedy,
            cx,
        }
    }

    /// Number of stages in the sequence.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Runs the pipeline from the persisted resume point.
    ///
    /// # Errors
    ///
    /// [`DeployError::Stage`] when a stage failed and remediation did not
    /// fix it; [`DeployError::Remedy`] when remediation could not be
    /// attempted; [`DeployError::Persistence`] when the resume point could
    /// not be written.
    pub async fn run(&self) -> Result<RunReport, DeployError> {
        let run_id = Uuid::new_v4();
        let start = self.resume.get_stage().await?;
        info!(
            %run_id,
            start,
            total = self.stages.len(),
            "starting provisioning run"
        );

        let mut stages_run = 0;
        for index in start..self.stages.len() {
            let stage = &self.stages[index];
            let name = stage.name().to_string();

            // Persist before executing: a crash during the stage resumes
            // by re-running this same index.
            self.resume.set_stage(index).await?;

            self.cx
                .progress
                .report(ProgressEvent::new(&name, 0, "Starting"));
            info!(stage = %name, index, "stage starting");

            match stage.run(&self.cx).await {
                Ok(()) => {
                    stages_run += 1;
                    info!(stage = %name, index, "stage completed");
                }
                Err(stage_err) => {
                    self.cx.progress.report(ProgressEvent::new(
                        &name,
                        100,
                        format!("Failed: {stage_err}"),
                    ));
                    error!(stage = %name, %stage_err, "stage failed, attempting remediation");

                    let attempt = self
                        .remedy
                        .attempt_fix(&name, &stage_err.to_string())
                        .await
                        .map_err(|source| DeployError::Remedy {
                            stage: name.clone(),
                            source,
                        })?;

                    if attempt.fixed() {
                        // The fix wants a reboot to take effect. Stop here;
                        // the persisted index retries this stage next boot.
                        info!(stage = %name, "remediation succeeded, run stops for restart");
                        return Ok(RunReport {
                            run_id,
                            outcome: RunOutcome::RemediationScheduled { stage: name },
                            stages_run,
                        });
                    }

                    return Err(DeployError::Stage {
                        stage: name,
                        source: stage_err,
                    });
                }
            }
        }

        // Completion marker: store == stage count.
        self.resume.set_stage(self.stages.len()).await?;
        info!(%run_id, stages_run, "provisioning run completed");

        Ok(RunReport {
            run_id,
            outcome: RunOutcome::Completed,
            stages_run,
        })
    }
}
