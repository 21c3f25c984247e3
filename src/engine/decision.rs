// src/engine/decision.rs

//! Pure scheduling decision for a single step.
//!
//! The driver in [`context`](super::context) builds a [`StepSnapshot`] under
//! the plan's read lock and acts on the returned [`Decision`]. Nothing here
//! touches shared state, so every policy rule is testable on its own.

use crate::plan::{StepKind, StepStatus};

/// Everything the decision needs to know about one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSnapshot {
    pub kind: StepKind,
    pub status: StepStatus,
    pub predecessors: Vec<StepStatus>,
    /// Status of the paired `before:X` step, for `after:X` steps.
    pub paired_before: Option<StepStatus>,
    pub halted: bool,
    pub blacklisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not ready yet, or already handled.
    Wait,
    /// Move straight to SKIPPED without running.
    Skip,
    /// A PLAN step whose predecessors all executed: run the planner.
    Plan,
    /// Dispatch the step. With `report_skipped`, a successful run still ends
    /// in SKIPPED.
    Schedule { report_skipped: bool },
}

pub fn decide(step: &StepSnapshot) -> Decision {
    if !matches!(step.status, StepStatus::Created | StepStatus::Planning) {
        return Decision::Wait;
    }
    if !step.predecessors.iter().all(|s| s.is_terminal()) {
        return Decision::Wait;
    }
    let all_executed = step
        .predecessors
        .iter()
        .all(|s| *s == StepStatus::Executed);

    match (step.kind, step.status) {
        (StepKind::Plan, StepStatus::Planning) => {
            if all_executed {
                Decision::Plan
            } else {
                Decision::Skip
            }
        }
        (_, StepStatus::Planning) => Decision::Wait,
        (StepKind::Teardown, _) => Decision::Schedule {
            report_skipped: false,
        },
        (StepKind::After, _) if step.paired_before.is_some() => {
            if step.paired_before == Some(StepStatus::Executed) {
                Decision::Schedule {
                    report_skipped: !all_executed,
                }
            } else {
                Decision::Skip
            }
        }
        _ => {
            if !step.halted && !step.blacklisted && all_executed {
                Decision::Schedule {
                    report_skipped: false,
                }
            } else {
                Decision::Skip
            }
        }
    }
}
