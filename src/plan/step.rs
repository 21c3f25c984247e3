// src/plan/step.rs

//! Build steps and their status state machine.
//!
//! ```text
//! CREATED -> { PLANNING, SCHEDULED, SKIPPED } -> { EXECUTED, FAILED, SKIPPED }
//! ```
//!
//! PLAN markers start in `PLANNING`; every other step starts in `CREATED`.
//! Transitions are compare-and-set so that exactly one dispatcher wins a step.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::BuildError;
use crate::lifecycle::{AFTER, BEFORE};
use crate::plan::{PLAN, SETUP, TEARDOWN, base_name};
use crate::plugin::MojoExecution;
use crate::project::ProjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StepStatus {
    Created = 0,
    Planning = 1,
    Scheduled = 2,
    Executed = 3,
    Failed = 4,
    Skipped = 5,
}

impl StepStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => StepStatus::Created,
            1 => StepStatus::Planning,
            2 => StepStatus::Scheduled,
            3 => StepStatus::Executed,
            4 => StepStatus::Failed,
            _ => StepStatus::Skipped,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Executed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Created => "CREATED",
            StepStatus::Planning => "PLANNING",
            StepStatus::Scheduled => "SCHEDULED",
            StepStatus::Executed => "EXECUTED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

/// Mutable runtime state of a step, shared with the worker executing it.
#[derive(Debug)]
pub struct StepState {
    status: AtomicU8,
    failure: Mutex<Option<BuildError>>,
}

impl StepState {
    pub fn new(status: StepStatus) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
            failure: Mutex::new(None),
        }
    }

    pub fn status(&self) -> StepStatus {
        StepStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Atomically move from `from` to `to`; `false` if another thread won.
    pub fn compare_and_set(&self, from: StepStatus, to: StepStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn set_failure(&self, error: BuildError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn failure(&self) -> Option<BuildError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// What a step stands for, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Plan,
    Setup,
    Teardown,
    /// `before:X`
    Before,
    /// Phase body `X`.
    Phase,
    /// `after:X`
    After,
    /// Ad-hoc goal step (CLI goal or forked goal).
    Goal,
}

impl StepKind {
    pub fn of(name: &str, has_phase: bool) -> Self {
        let base = base_name(name);
        match base {
            PLAN => StepKind::Plan,
            SETUP => StepKind::Setup,
            TEARDOWN => StepKind::Teardown,
            _ if base.starts_with(BEFORE) => StepKind::Before,
            _ if base.starts_with(AFTER) => StepKind::After,
            _ if has_phase => StepKind::Phase,
            _ => StepKind::Goal,
        }
    }

    /// Cleanup steps run even when the reactor is halted.
    pub fn is_cleanup(self) -> bool {
        matches!(self, StepKind::After | StepKind::Teardown)
    }
}

/// One unit of orderable work for one project.
///
/// Edges live in the owning [`BuildPlan`](crate::plan::BuildPlan); the step
/// itself only carries identity, bound executions and shared state.
#[derive(Debug, Clone)]
pub struct BuildStep {
    pub project: ProjectId,
    pub name: String,
    /// Lifecycle phase this step belongs to, if any.
    pub phase: Option<String>,
    pub kind: StepKind,
    executions: BTreeMap<i32, Vec<MojoExecution>>,
    pruned: bool,
    state: Arc<StepState>,
}

impl BuildStep {
    pub fn new(project: ProjectId, name: impl Into<String>, phase: Option<String>) -> Self {
        let name = name.into();
        let kind = StepKind::of(&name, phase.is_some());
        let initial = if kind == StepKind::Plan {
            StepStatus::Planning
        } else {
            StepStatus::Created
        };
        Self {
            project,
            name,
            phase,
            kind,
            executions: BTreeMap::new(),
            pruned: false,
            state: Arc::new(StepState::new(initial)),
        }
    }

    /// A step outside a truncated lifecycle: kept for ordering only.
    pub fn pruned(mut self) -> Self {
        self.pruned = true;
        self
    }

    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    pub(crate) fn set_pruned(&mut self, pruned: bool) {
        self.pruned = pruned;
    }

    pub fn state(&self) -> &Arc<StepState> {
        &self.state
    }

    pub fn status(&self) -> StepStatus {
        self.state.status()
    }

    /// Bind an execution at `priority`.
    ///
    /// Ignored on pruned steps and when an execution of the same goal with the
    /// same id is already bound. Returns whether it was added.
    pub fn add_execution(&mut self, execution: MojoExecution, priority: i32) -> bool {
        if self.pruned || self.has_execution(&execution) {
            return false;
        }
        self.executions.entry(priority).or_default().push(execution);
        true
    }

    fn has_execution(&self, execution: &MojoExecution) -> bool {
        self.executions.values().flatten().any(|e| {
            e.execution_id == execution.execution_id && e.descriptor.id() == execution.descriptor.id()
        })
    }

    /// Bound executions, by priority then binding order.
    pub fn executions(&self) -> impl Iterator<Item = &MojoExecution> {
        self.executions.values().flatten()
    }

    pub fn executions_with_priority(&self) -> impl Iterator<Item = (i32, &MojoExecution)> {
        self.executions
            .iter()
            .flat_map(|(p, execs)| execs.iter().map(move |e| (*p, e)))
    }

    pub fn has_executions(&self) -> bool {
        self.executions.values().any(|v| !v.is_empty())
    }

    /// Name of the `before:X` step paired with this `after:X` step.
    pub fn paired_before_name(&self) -> Option<String> {
        if self.kind != StepKind::After {
            return None;
        }
        let at = self.name.rfind(AFTER)?;
        Some(format!(
            "{}{BEFORE}{}",
            &self.name[..at],
            &self.name[at + AFTER.len()..]
        ))
    }

    /// Copy of this step under a new name, with fresh state.
    pub(crate) fn renamed(&self, name: String) -> Self {
        let mut step = BuildStep::new(self.project.clone(), name, self.phase.clone());
        step.executions = self.executions.clone();
        step.pruned = self.pruned;
        step
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project.artifact_id(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MojoError;
    use crate::plugin::MojoDescriptor;

    fn project() -> ProjectId {
        ProjectId::new("org.example", "core", "1.0")
    }

    fn execution(goal: &str, id: &str) -> MojoExecution {
        MojoExecution::new(
            Arc::new(MojoDescriptor::new("org.example.plugins:tools", goal)),
            id,
        )
    }

    #[test]
    fn kinds_follow_names() {
        let p = project();
        assert_eq!(BuildStep::new(p.clone(), PLAN, None).kind, StepKind::Plan);
        assert_eq!(BuildStep::new(p.clone(), SETUP, None).kind, StepKind::Setup);
        assert_eq!(BuildStep::new(p.clone(), TEARDOWN, None).kind, StepKind::Teardown);
        assert_eq!(
            BuildStep::new(p.clone(), "before:compile", Some("compile".into())).kind,
            StepKind::Before
        );
        assert_eq!(
            BuildStep::new(p.clone(), "fork(gen):after:sources", Some("sources".into())).kind,
            StepKind::After
        );
        assert_eq!(
            BuildStep::new(p.clone(), "compile", Some("compile".into())).kind,
            StepKind::Phase
        );
        assert_eq!(BuildStep::new(p, "check", None).kind, StepKind::Goal);
    }

    #[test]
    fn plan_steps_start_in_planning() {
        assert_eq!(BuildStep::new(project(), PLAN, None).status(), StepStatus::Planning);
        assert_eq!(BuildStep::new(project(), SETUP, None).status(), StepStatus::Created);
    }

    #[test]
    fn compare_and_set_only_wins_once() {
        let state = StepState::new(StepStatus::Created);
        assert!(state.compare_and_set(StepStatus::Created, StepStatus::Scheduled));
        assert!(!state.compare_and_set(StepStatus::Created, StepStatus::Scheduled));
        assert!(!state.compare_and_set(StepStatus::Created, StepStatus::Skipped));
        assert_eq!(state.status(), StepStatus::Scheduled);
        assert!(!state.status().is_terminal());
        assert!(state.compare_and_set(StepStatus::Scheduled, StepStatus::Executed));
        assert!(state.status().is_terminal());
    }

    #[test]
    fn failure_is_attached_to_state() {
        let state = StepState::new(StepStatus::Scheduled);
        assert!(state.failure().is_none());
        let error = BuildError::Mojo {
            project: "core".to_string(),
            step: "compile".to_string(),
            source: MojoError::Failure {
                goal: "compile".to_string(),
                message: "syntax error".to_string(),
            },
        };
        state.set_failure(error.clone());
        assert_eq!(state.failure(), Some(error));
    }

    #[test]
    fn executions_are_ordered_by_priority_and_first_writer_wins() {
        let mut step = BuildStep::new(project(), "compile", Some("compile".into()));
        assert!(step.add_execution(execution("late", "default"), 10));
        assert!(step.add_execution(execution("early", "default"), -5));
        assert!(step.add_execution(execution("middle", "default"), 0));
        assert!(!step.add_execution(execution("middle", "default"), 20));
        assert!(step.add_execution(execution("middle", "other"), 0));

        let goals: Vec<_> = step
            .executions()
            .map(|e| format!("{}@{}", e.goal(), e.execution_id))
            .collect();
        assert_eq!(
            goals,
            vec!["early@default", "middle@default", "middle@other", "late@default"]
        );
    }

    #[test]
    fn pruned_steps_reject_executions() {
        let mut step = BuildStep::new(project(), "deploy", Some("deploy".into())).pruned();
        assert!(!step.add_execution(execution("upload", "default"), 0));
        assert!(!step.has_executions());
    }

    #[test]
    fn after_steps_know_their_before_step() {
        let step = BuildStep::new(project(), "fork(gen):after:sources", Some("sources".into()));
        assert_eq!(
            step.paired_before_name().as_deref(),
            Some("fork(gen):before:sources")
        );
        let body = BuildStep::new(project(), "sources", Some("sources".into()));
        assert!(body.paired_before_name().is_none());
    }
}
