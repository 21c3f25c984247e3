// src/engine/result.rs

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::errors::BuildError;
use crate::project::ProjectId;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Success,
    Failure(BuildError),
    Skipped,
}

/// Per-project result recorded by the project's teardown step.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub project: ProjectId,
    pub wall_time: Duration,
    pub exec_time: Duration,
    pub outcome: BuildOutcome,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, BuildOutcome::Failure(_))
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == BuildOutcome::Skipped
    }
}

/// Results shared by every worker of a build.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    exceptions: Mutex<Vec<BuildError>>,
    summaries: Mutex<Vec<BuildSummary>>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exception(&self, error: BuildError) {
        self.exceptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    pub fn add_build_summary(&self, summary: BuildSummary) {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(summary);
    }

    pub fn exceptions(&self) -> Vec<BuildError> {
        self.exceptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_exceptions(&self) -> bool {
        !self
            .exceptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Summaries in the order projects finished.
    pub fn build_summaries(&self) -> Vec<BuildSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn build_summary(&self, project: &ProjectId) -> Option<BuildSummary> {
        self.summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| &s.project == project)
            .cloned()
    }
}
