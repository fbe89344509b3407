use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Stages of one analysis.
///
/// `Pending → Validating → Reading → Detecting → Extracting → Finalizing`,
/// then `Completed`. `Aborted` can follow any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Validating,
    Reading,
    Detecting,
    Extracting,
    Finalizing,
    Completed,
    Aborted,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Validating => "validating",
            Stage::Reading => "reading",
            Stage::Detecting => "detecting",
            Stage::Extracting => "extracting",
            Stage::Finalizing => "finalizing",
            Stage::Completed => "completed",
            Stage::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Aborted)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (from, Aborted) => !from.is_terminal(),
            (Pending, Validating)
            | (Validating, Reading)
            | (Reading, Detecting)
            | (Detecting, Extracting)
            | (Extracting, Finalizing)
            | (Finalizing, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation state, owned by exactly one analysis.
#[derive(Debug)]
pub struct OperationContext {
    id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    stage: Stage,
    /// Stages visited, in order
    history: Vec<Stage>,
}

impl OperationContext {
    pub fn new(sequence: u64) -> Self {
        Self {
            id: format!("op-{}", sequence),
            started_at: Utc::now(),
            started: Instant::now(),
            stage: Stage::Pending,
            history: vec![Stage::Pending],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn advance(&mut self, next: Stage) {
        if !self.stage.can_advance_to(next) {
            debug!(op = %self.id, from = %self.stage, to = %next, "ignored stage transition");
            return;
        }
        debug!(op = %self.id, from = %self.stage, to = %next, "stage");
        self.stage = next;
        self.history.push(next);
    }

    /// Leave the context in a terminal stage.
    pub fn finish(&mut self, success: bool) {
        if success {
            self.advance(Stage::Completed);
        }
        if !self.stage.is_terminal() {
            self.advance(Stage::Aborted);
        }
    }
}
