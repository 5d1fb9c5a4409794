//! Progress reporting.
//!
//! [`ProgressSink`] is fire-and-forget: reporting never fails and never
//! blocks the pipeline. Consumers display only the most recent event per
//! stage; no history is required, though [`CollectingProgressSink`] retains
//! one for tests.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::info;

/// A point-in-time progress report for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The stage this event belongs to.
    pub stage: String,
    /// Completion percentage, 0..=100.
    pub percent: u8,
    /// Human-readable status line.
    pub message: String,
}

impl ProgressEvent {
    /// Creates a new event, clamping `percent` to 100.
    #[must_use]
    pub fn new(stage: impl Into<String>, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Receives progress events.
///
/// Implementations must not fail and must return promptly; the pipeline
/// calls [`report`](ProgressSink::report) synchronously between commands.
pub trait ProgressSink: Send + Sync {
    /// Delivers one event to the display or log.
    fn report(&self, event: ProgressEvent);
}

/// Discards all events. The default when no display is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn report(&self, event: ProgressEvent) {
        info!(
            stage = %event.stage,
            percent = event.percent,
            "{}",
            event.message
        );
    }
}

/// Renders a single overwritten console line, `[Stage] 40% - message`.
///
/// Write errors are swallowed: losing a progress frame must never affect
/// the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgressSink;

impl ProgressSink for ConsoleProgressSink {
    fn report(&self, event: ProgressEvent) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(
            stdout,
            "\r\x1b[2K[{}] {}% - {}",
            event.stage, event.percent, event.message
        );
        let _ = stdout.flush();
    }
}

/// Retains every event, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingProgressSink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// Returns the most recent event, if any.
    #[must_use]
    pub fn last(&self) -> Option<ProgressEvent> {
        self.events.lock().last().cloned()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Returns the events reported for one stage.
    #[must_use]
    pub fn events_for(&self, stage: &str) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}
