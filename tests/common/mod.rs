#![allow(dead_code)]

pub use weave_test_utils::builders::*;
pub use weave_test_utils::recording::{Behaviour, RecordingExecutor};
pub use weave_test_utils::{BuildRun, init_tracing, run_build};

use weave::engine::BuildOutcome;

/// `SUCCESS`, `FAILURE` or `SKIPPED` for the project with artifact id
/// `artifact`, or `NONE` when no summary was recorded.
pub fn outcome(run: &BuildRun, artifact: &str) -> &'static str {
    match run.result().build_summary(&project_id(artifact)) {
        Some(summary) => match summary.outcome {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Failure(_) => "FAILURE",
            BuildOutcome::Skipped => "SKIPPED",
        },
        None => "NONE",
    }
}

/// Every step of the finished build reached a terminal status.
pub fn assert_all_terminal(run: &BuildRun) {
    let pending: Vec<String> = run
        .steps
        .iter()
        .filter(|s| !s.status.is_terminal())
        .map(|s| format!("{}:{} ({})", s.project.artifact_id(), s.name, s.status))
        .collect();
    assert!(pending.is_empty(), "steps left pending: {pending:?}");
}
