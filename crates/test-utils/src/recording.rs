use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use weave::engine::{ExecutionEvent, ExecutionListener, Session};
use weave::errors::MojoError;
use weave::exec::MojoExecutor;
use weave::plugin::MojoExecution;
use weave::project::Project;

/// What a scripted goal does instead of succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Fail,
    Fatal,
    Panic,
}

/// One recorded goal execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Artifact id of the project.
    pub project: String,
    pub goal: String,
    pub execution_id: String,
}

/// A fake goal executor that:
/// - records every execution it is handed, in start order
/// - fails, aborts or panics on scripted `(project, goal)` pairs
/// - optionally sleeps per goal so overlapping steps can be observed
/// - tracks how many steps ran at the same time
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<Call>>,
    scripted: Mutex<HashMap<(String, String), Behaviour>>,
    delay: Option<Duration>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` in every goal.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, project: &str, goal: &str, behaviour: Behaviour) -> Self {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((project.to_string(), goal.to_string()), behaviour);
        self
    }

    pub fn fail_on(self, project: &str, goal: &str) -> Self {
        self.script(project, goal, Behaviour::Fail)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Goals run for `project`, in start order.
    pub fn goals_for(&self, project: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.project == project)
            .map(|c| c.goal)
            .collect()
    }

    pub fn count(&self, project: &str, goal: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.project == project && c.goal == goal)
            .count()
    }

    /// Position of the first `(project, goal)` call.
    pub fn position(&self, project: &str, goal: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|c| c.project == project && c.goal == goal)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn run_one(&self, project: &Project, execution: &MojoExecution) -> Result<(), MojoError> {
        let goal = execution.goal().to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Call {
                project: project.artifact_id.clone(),
                goal: goal.clone(),
                execution_id: execution.execution_id.clone(),
            });

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let behaviour = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(project.artifact_id.clone(), goal.clone()))
            .copied();
        match behaviour {
            None => Ok(()),
            Some(Behaviour::Fail) => Err(MojoError::Failure {
                goal,
                message: "scripted failure".to_string(),
            }),
            Some(Behaviour::Fatal) => Err(MojoError::Fatal {
                goal,
                message: "scripted abort".to_string(),
            }),
            Some(Behaviour::Panic) => panic!("scripted panic in {goal}"),
        }
    }
}

/// Decrements the running count even when a goal panics.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MojoExecutor for RecordingExecutor {
    fn execute(
        &self,
        _session: &Session,
        project: &Project,
        executions: &[MojoExecution],
    ) -> Result<(), MojoError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        for execution in executions {
            self.run_one(project, execution)?;
        }
        Ok(())
    }
}

/// Listener that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ExecutionListener for RecordingListener {
    fn on_event(&self, event: &ExecutionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
