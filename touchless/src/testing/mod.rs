//! Test doubles for pipeline components.
//!
//! Scripted fakes with call recording, used by this crate's own tests and
//! available to downstream integration tests.

use crate::advisor::{Advisor, ReplyItem};
use crate::errors::{ExecutionError, RemedyError, StageError};
use crate::exec::{CommandResult, CommandRunner, CommandSpec};
use crate::pipeline::{Stage, StageCx};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// What a [`MockStage`] does when run.
#[derive(Debug, Clone)]
enum MockBehavior {
    Succeed,
    Fail(String),
}

/// A stage that records invocations and succeeds or fails on demand.
pub struct MockStage {
    name: String,
    behavior: MockBehavior,
    calls: Mutex<usize>,
}

impl MockStage {
    /// A stage that always succeeds.
    #[must_use]
    pub fn ok(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: MockBehavior::Succeed,
            calls: Mutex::new(0),
        }
    }

    /// A stage that always fails with the given message.
    #[must_use]
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: MockBehavior::Fail(message.into()),
            calls: Mutex::new(0),
        }
    }

    /// Number of times the stage was run.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _cx: &StageCx) -> Result<(), StageError> {
        *self.calls.lock() += 1;
        match &self.behavior {
            MockBehavior::Succeed => Ok(()),
            MockBehavior::Fail(message) => Err(StageError::Other(message.clone())),
        }
    }
}

/// An advisor that replies with a fixed item sequence, or fails.
pub struct ScriptedAdvisor {
    items: Vec<ReplyItem>,
    fail: bool,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedAdvisor {
    /// Replies with a single message carrying `script`.
    #[must_use]
    pub fn with_script(script: impl Into<String>) -> Self {
        Self::with_items(vec![ReplyItem::Message {
            text: script.into(),
        }])
    }

    /// Replies with the given items verbatim.
    #[must_use]
    pub fn with_items(items: Vec<ReplyItem>) -> Self {
        Self {
            items,
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every request, simulating an unreachable service.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            items: Vec::new(),
            fail: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// The `(stage, error)` pairs this advisor was asked about.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Advisor for ScriptedAdvisor {
    async fn propose_fix(&self, stage: &str, error: &str) -> Result<Vec<ReplyItem>, RemedyError> {
        self.requests
            .lock()
            .push((stage.to_string(), error.to_string()));
        if self.fail {
            return Err(RemedyError::MissingCredentials("OPENAI_API_KEY".to_string()));
        }
        Ok(self.items.clone())
    }
}

/// A command runner that replays canned results and records every spec.
pub struct StaticRunner {
    results: Mutex<VecDeque<CommandResult>>,
    launch_failure: bool,
    recorded: Mutex<Vec<CommandSpec>>,
}

impl StaticRunner {
    /// Every command "exits 0" with empty output.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            launch_failure: false,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Replays `results` in order, then falls back to exit 0.
    #[must_use]
    pub fn with_results(results: Vec<CommandResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            launch_failure: false,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Every launch fails as if the program did not exist.
    #[must_use]
    pub fn unlaunchable() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            launch_failure: true,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// The specs run so far, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for StaticRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandResult, ExecutionError> {
        self.recorded.lock().push(spec.clone());
        if self.launch_failure {
            return Err(ExecutionError {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "program not found"),
            });
        }
        Ok(self.results.lock().pop_front().unwrap_or(CommandResult {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoOpProgressSink;
    use std::sync::Arc;

    #[tokio::test]
    async fn mock_stage_counts_calls() {
        let stage = MockStage::ok("A");
        let cx = StageCx::new(
            Arc::new(StaticRunner::succeeding()),
            Arc::new(NoOpProgressSink),
        );

        assert_eq!(stage.call_count(), 0);
        stage.run(&cx).await.unwrap();
        stage.run(&cx).await.unwrap();
        assert_eq!(stage.call_count(), 2);

        let failing = MockStage::failing("B", "nope");
        let err = failing.run(&cx).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn scripted_advisor_records_requests() {
        let advisor = ScriptedAdvisor::with_script("echo hi");
        let items = advisor.propose_fix("Prereqs", "boom").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(advisor.requests(), vec![("Prereqs".to_string(), "boom".to_string())]);
    }

    #[tokio::test]
    async fn static_runner_replays_then_defaults() {
        let runner = StaticRunner::with_results(vec![CommandResult {
            exit_code: 7,
            stdout: "once".to_string(),
            stderr: String::new(),
        }]);

        let spec = CommandSpec::new("whatever");
        assert_eq!(runner.run(&spec).await.unwrap().exit_code, 7);
        assert_eq!(runner.run(&spec).await.unwrap().exit_code, 0);
        assert_eq!(runner.recorded().len(), 2);
    }

    #[tokio::test]
    async fn unlaunchable_runner_fails_every_spawn() {
        let runner = StaticRunner::unlaunchable();
        let err = runner.run(&CommandSpec::new("missing")).await.unwrap_err();
        assert_eq!(err.program, "missing");
    }
}
