//! End-to-end properties of the pipeline state machine.

#[cfg(test)]
mod tests {
    use crate::config::HostShell;
    use crate::errors::DeployError;
    use crate::exec::CommandResult;
    use crate::journal::Journal;
    use crate::pipeline::{PipelineRunner, RunOutcome, Stage, StageCx};
    use crate::progress::CollectingProgressSink;
    use crate::remedy::RemediationEngine;
    use crate::resume::{InMemoryResumeStore, ResumeStore};
    use crate::testing::{MockStage, ScriptedAdvisor, StaticRunner};
    use std::sync::Arc;

    struct Harness {
        stages: Vec<Arc<MockStage>>,
        resume: Arc<InMemoryResumeStore>,
        progress: Arc<CollectingProgressSink>,
        journal: Arc<Journal>,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn runner(&self, advisor: ScriptedAdvisor, shell_runner: StaticRunner) -> PipelineRunner {
            let engine = RemediationEngine::new(
                self.journal.clone(),
                Arc::new(advisor),
                Arc::new(shell_runner),
                HostShell::sh(),
            );
            let cx = StageCx::new(
                Arc::new(StaticRunner::succeeding()),
                self.progress.clone(),
            );
            let stages: Vec<Arc<dyn Stage>> = self
                .stages
                .iter()
                .map(|s| s.clone() as Arc<dyn Stage>)
                .collect();
            PipelineRunner::new(stages, self.resume.clone(), engine, cx)
        }
    }

    fn harness(stages: Vec<Arc<MockStage>>, start: Option<usize>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(Journal::create(dir.path().join("logs")).unwrap());
        let resume = Arc::new(match start {
            Some(index) => InMemoryResumeStore::with_stage(index),
            None => InMemoryResumeStore::new(),
        });
        Harness {
            stages,
            resume,
            progress: Arc::new(CollectingProgressSink::new()),
            journal,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn all_stages_succeed_leaves_store_at_n() {
        let stages = vec![
            Arc::new(MockStage::ok("A")),
            Arc::new(MockStage::ok("B")),
            Arc::new(MockStage::ok("C")),
        ];
        let h = harness(stages.clone(), None);
        let runner = h.runner(ScriptedAdvisor::with_script(""), StaticRunner::succeeding());

        let report = runner.run().await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.succeeded());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.stages_run, 3);
        assert_eq!(h.resume.get_stage().await.unwrap(), 3);
        assert!(stages.iter().all(|s| s.call_count() == 1));
    }

    #[tokio::test]
    async fn successful_remediation_stops_the_run_with_store_at_k() {
        // Stage index 1 of 3 fails; the fix script succeeds.
        let stages = vec![
            Arc::new(MockStage::ok("A")),
            Arc::new(MockStage::failing("B", "disk full")),
            Arc::new(MockStage::ok("C")),
        ];
        let h = harness(stages.clone(), None);
        let runner = h.runner(
            ScriptedAdvisor::with_script("cleanup-temp-files\nexit 0"),
            StaticRunner::succeeding(),
        );

        let report = runner.run().await.unwrap();
        assert_eq!(
            report.outcome,
            RunOutcome::RemediationScheduled {
                stage: "B".to_string()
            }
        );
        // The run counts as failed even though the fix succeeded.
        assert_eq!(report.exit_code(), 1);

        // Store holds the failed index so the next run retries stage B.
        assert_eq!(h.resume.get_stage().await.unwrap(), 1);

        // Stage C never ran in this process.
        assert_eq!(stages[2].call_count(), 0);

        // The fix script is on disk and non-empty.
        let script_path = h.journal.fix_script_path("B", "sh");
        let script = std::fs::read_to_string(script_path).unwrap();
        assert!(!script.is_empty());
    }

    #[tokio::test]
    async fn failed_remediation_aborts_with_store_at_k() {
        let stages = vec![
            Arc::new(MockStage::ok("A")),
            Arc::new(MockStage::ok("B")),
            Arc::new(MockStage::failing("C", "setup exited 1")),
        ];
        let h = harness(stages, None);
        let runner = h.runner(
            ScriptedAdvisor::with_script("exit 1"),
            StaticRunner::with_results(vec![CommandResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: String::new(),
            }]),
        );

        let err = runner.run().await.unwrap_err();
        match err {
            DeployError::Stage { stage, .. } => assert_eq!(stage, "C"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.resume.get_stage().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remediation_machinery_failure_aborts_without_retry() {
        let stages = vec![Arc::new(MockStage::failing("A", "boom"))];
        let h = harness(stages, None);
        let runner = h.runner(ScriptedAdvisor::failing(), StaticRunner::succeeding());

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, DeployError::Remedy { ref stage, .. } if stage == "A"));
        assert_eq!(h.resume.get_stage().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn resume_skips_already_completed_stages() {
        // Store pre-set to 2 of 3: only index 2 runs.
        let stages = vec![
            Arc::new(MockStage::ok("A")),
            Arc::new(MockStage::ok("B")),
            Arc::new(MockStage::ok("C")),
        ];
        let h = harness(stages.clone(), Some(2));
        let runner = h.runner(ScriptedAdvisor::with_script(""), StaticRunner::succeeding());

        let report = runner.run().await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.stages_run, 1);
        assert_eq!(stages[0].call_count(), 0);
        assert_eq!(stages[1].call_count(), 0);
        assert_eq!(stages[2].call_count(), 1);
        assert_eq!(h.resume.get_stage().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn store_already_at_n_is_a_completed_no_op() {
        let stages = vec![Arc::new(MockStage::ok("A")), Arc::new(MockStage::ok("B"))];
        let h = harness(stages.clone(), Some(2));
        let runner = h.runner(ScriptedAdvisor::with_script(""), StaticRunner::succeeding());

        let report = runner.run().await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.stages_run, 0);
        assert!(stages.iter().all(|s| s.call_count() == 0));
    }

    #[tokio::test]
    async fn store_advances_monotonically_during_the_run() {
        // Write-before-execute: each stage sees its own index persisted.
        struct Watcher {
            resume: Arc<InMemoryResumeStore>,
            seen: parking_lot::Mutex<Vec<usize>>,
        }

        #[async_trait::async_trait]
        impl Stage for WatcherStage {
            fn name(&self) -> &str {
                "watch"
            }
            async fn run(&self, _cx: &StageCx) -> Result<(), crate::errors::StageError> {
                let index = self.watcher.resume.get_stage().await.map_err(|e| {
                    crate::errors::StageError::Other(e.to_string())
                })?;
                self.watcher.seen.lock().push(index);
                Ok(())
            }
        }

        struct WatcherStage {
            watcher: Arc<Watcher>,
        }

        let h = harness(Vec::new(), None);
        let watcher = Arc::new(Watcher {
            resume: h.resume.clone(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let stages: Vec<Arc<dyn Stage>> = (0..3)
            .map(|_| {
                Arc::new(WatcherStage {
                    watcher: watcher.clone(),
                }) as Arc<dyn Stage>
            })
            .collect();

        let engine = RemediationEngine::new(
            h.journal.clone(),
            Arc::new(ScriptedAdvisor::with_script("")),
            Arc::new(StaticRunner::succeeding()),
            HostShell::sh(),
        );
        let cx = StageCx::new(Arc::new(StaticRunner::succeeding()), h.progress.clone());
        let runner = PipelineRunner::new(stages, h.resume.clone(), engine, cx);

        runner.run().await.unwrap();
        assert_eq!(*watcher.seen.lock(), vec![0, 1, 2]);
        assert_eq!(h.resume.get_stage().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failure_reports_progress_before_remediation() {
        let stages = vec![Arc::new(MockStage::failing("Prereqs", "mirror down"))];
        let h = harness(stages, None);
        let runner = h.runner(
            ScriptedAdvisor::with_script("exit 1"),
            StaticRunner::with_results(vec![CommandResult {
                exit_code: 1,
                stdout: String::new(),
                stderr: String::new(),
            }]),
        );

        let _ = runner.run().await;
        let events = h.progress.events_for("Prereqs");
        assert!(events.iter().any(|e| e.message.contains("mirror down")));
    }
}
