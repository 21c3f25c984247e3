// src/engine/context.rs

//! The scheduler: walks a live build plan on a bounded worker pool.
//!
//! The driver scans the plan's cached topological order under the read lock,
//! asks [`decide`] what to do with each candidate step, claims scheduled
//! steps by compare-and-set and hands them to workers. Step bodies run on
//! tokio's blocking pool, gated by a semaphore sized to the build's thread
//! count. Planning takes the write lock.
//!
//! Every finished step reports back over a channel, and the driver rescans
//! until nothing is in flight.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore, mpsc};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::engine::clock::{ClockKey, Clocks};
use crate::engine::decision::{Decision, StepSnapshot, decide};
use crate::engine::events::ExecutionEvent;
use crate::engine::mapping::PlanCalculator;
use crate::engine::planner::Planner;
use crate::engine::result::{BuildOutcome, BuildSummary};
use crate::engine::segments::TaskSegment;
use crate::engine::{ReactorContext, Services, Session};
use crate::errors::{BuildError, Result};
use crate::exec::finalize_configuration;
use crate::plan::{BuildPlan, StepId, StepKind, StepState, StepStatus};
use crate::plugin::MojoExecution;
use crate::project::ProjectId;
use crate::types::FailureBehaviour;

/// A claimed step, with everything its worker needs outside the plan lock.
struct StepJob {
    id: StepId,
    project: ProjectId,
    project_name: String,
    name: String,
    kind: StepKind,
    executions: Vec<MojoExecution>,
    state: Arc<StepState>,
    report_skipped: bool,
    /// A direct successor is a PLAN step.
    next_is_planning: bool,
    /// Every other step of the project; only filled for TEARDOWN.
    siblings: Vec<Arc<StepState>>,
}

/// One reactor build in progress.
#[derive(Clone)]
pub struct BuildContext {
    services: Services,
    session: Arc<Session>,
    reactor: ReactorContext,
    plan: Arc<RwLock<BuildPlan>>,
    clocks: Arc<Clocks>,
    permits: Arc<Semaphore>,
    threads: usize,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("threads", &self.threads)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Compute the initial plan and size the worker pool.
    pub fn new(
        services: Services,
        session: Arc<Session>,
        reactor: ReactorContext,
        segments: &[TaskSegment],
    ) -> Result<Self> {
        let threads = session
            .request()
            .degree_of_concurrency
            .min(session.projects().len())
            .max(1);
        session.set_parallel(threads > 1);

        let plan = PlanCalculator::new(
            &session,
            services.resolver.as_ref(),
            services.lifecycles.as_ref(),
        )
        .build_initial_plan(segments)?;

        info!(
            threads,
            projects = session.projects().len(),
            steps = plan.len(),
            failure_behaviour = ?session.request().failure_behaviour,
            "starting reactor build"
        );

        Ok(Self {
            services,
            session,
            reactor,
            plan: Arc::new(RwLock::new(plan)),
            clocks: Arc::new(Clocks::new()),
            permits: Arc::new(Semaphore::new(threads)),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn plan(&self) -> &Arc<RwLock<BuildPlan>> {
        &self.plan
    }

    pub fn clocks(&self) -> &Arc<Clocks> {
        &self.clocks
    }

    /// Run the build to completion.
    ///
    /// Returns once no dispatched step is in flight and no further step can
    /// be scheduled.
    pub async fn execute(&self) {
        self.services.listener.on_event(&ExecutionEvent::SessionStarted);
        self.clocks.start(ClockKey::Global);

        let (tx, mut rx) = mpsc::unbounded_channel::<StepId>();
        {
            let mut plan = self.plan.write().await;
            self.run_planner(&mut plan);
        }

        let mut in_flight = 0usize;
        loop {
            in_flight += self.execute_plan(&tx).await;
            if in_flight == 0 {
                break;
            }
            if rx.recv().await.is_none() {
                break;
            }
            in_flight = in_flight.saturating_sub(1);
            while rx.try_recv().is_ok() {
                in_flight = in_flight.saturating_sub(1);
            }
        }

        self.report_unfinished().await;
        self.clocks.stop(ClockKey::Global);
        let (wall, _) = self.clocks.times(&ClockKey::Global);
        info!(elapsed = ?wall, halted = self.reactor.status().is_halted(), "reactor build finished");
        self.services.listener.on_event(&ExecutionEvent::SessionEnded);
    }

    /// One scheduling pass. Returns how many steps were dispatched.
    async fn execute_plan(&self, tx: &mpsc::UnboundedSender<StepId>) -> usize {
        let mut dispatched = 0;
        loop {
            let (jobs, needs_planning) = {
                let plan = self.plan.read().await;
                self.scan(&plan)
            };
            for job in jobs {
                self.dispatch(job, tx.clone());
                dispatched += 1;
            }

            if !needs_planning {
                break;
            }
            let mut plan = self.plan.write().await;
            if !self.run_planner(&mut plan) {
                break;
            }
        }
        dispatched
    }

    /// Decide every candidate step in topological order. Skips are applied
    /// immediately so later steps of the same pass see them.
    fn scan(&self, plan: &BuildPlan) -> (Vec<StepJob>, bool) {
        let mut jobs = Vec::new();
        let mut needs_planning = false;

        for &id in plan.sorted_nodes() {
            let step = plan.node(id);
            let status = step.status();
            if !matches!(status, StepStatus::Created | StepStatus::Planning) {
                continue;
            }

            match decide(&self.snapshot(plan, id)) {
                Decision::Wait => {}
                Decision::Plan => needs_planning = true,
                Decision::Skip => {
                    if step.state().compare_and_set(status, StepStatus::Skipped) {
                        debug!(project = %plan.project_name(&step.project), step = %step.name, "step skipped");
                    }
                }
                Decision::Schedule { report_skipped } => {
                    if step
                        .state()
                        .compare_and_set(StepStatus::Created, StepStatus::Scheduled)
                    {
                        jobs.push(self.job(plan, id, report_skipped));
                    }
                }
            }
        }
        (jobs, needs_planning)
    }

    fn snapshot(&self, plan: &BuildPlan, id: StepId) -> StepSnapshot {
        let step = plan.node(id);
        let paired_before = step
            .paired_before_name()
            .and_then(|name| plan.step(&step.project, &name))
            .map(|before| plan.node(before).status());
        let status = self.reactor.status();

        StepSnapshot {
            kind: step.kind,
            status: step.status(),
            predecessors: plan.predecessors(id).map(|p| plan.node(p).status()).collect(),
            paired_before,
            halted: status.is_halted(),
            blacklisted: status.is_blacklisted(&step.project),
        }
    }

    fn job(&self, plan: &BuildPlan, id: StepId, report_skipped: bool) -> StepJob {
        let step = plan.node(id);
        let siblings = if step.kind == StepKind::Teardown {
            plan.steps(&step.project)
                .filter(|s| *s != id)
                .map(|s| Arc::clone(plan.node(s).state()))
                .collect()
        } else {
            Vec::new()
        };

        StepJob {
            id,
            project: step.project.clone(),
            project_name: plan.project_name(&step.project),
            name: step.name.clone(),
            kind: step.kind,
            executions: step.executions().cloned().collect(),
            state: Arc::clone(step.state()),
            report_skipped,
            next_is_planning: plan
                .successors(id)
                .any(|s| plan.node(s).kind == StepKind::Plan),
            siblings,
        }
    }

    fn dispatch(&self, job: StepJob, tx: mpsc::UnboundedSender<StepId>) {
        let ctx = self.clone();
        let job = Arc::new(job);
        tokio::spawn(async move {
            let _permit = Arc::clone(&ctx.permits).acquire_owned().await.ok();

            let body_ctx = ctx.clone();
            let body_job = Arc::clone(&job);
            let outcome =
                match tokio::task::spawn_blocking(move || body_ctx.execute_step(&body_job)).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        let error = BuildError::Panicked {
                            project: job.project.to_string(),
                            step: job.name.clone(),
                            message: panic_message(err),
                        };
                        if job.kind == StepKind::Teardown {
                            ctx.handle_build_error(&job.project, &error);
                        }
                        Err(error)
                    }
                };

            ctx.complete_step(&job, outcome).await;
            let _ = tx.send(job.id);
        });
    }

    /// Step body; runs on a blocking worker thread.
    fn execute_step(&self, job: &StepJob) -> std::result::Result<(), BuildError> {
        debug!(project = %job.project_name, step = %job.name, "executing step");
        match job.kind {
            StepKind::Plan => Ok(()),
            StepKind::Setup => {
                self.services.listener.on_event(&ExecutionEvent::ProjectStarted {
                    project: job.project.clone(),
                });
                Ok(())
            }
            StepKind::Teardown => self.teardown(job),
            StepKind::Before | StepKind::Phase | StepKind::After | StepKind::Goal => {
                self.run_executions(job)
            }
        }
    }

    fn run_executions(&self, job: &StepJob) -> std::result::Result<(), BuildError> {
        if job.executions.is_empty() {
            return Ok(());
        }
        let Some(project) = self.session.project(&job.project) else {
            return Ok(());
        };

        let mut executions = job.executions.clone();
        for execution in &mut executions {
            self.services
                .configurators
                .get(execution.descriptor.configurator.as_deref())
                .configure(project, execution, true);
            finalize_configuration(execution);
        }

        let key = ClockKey::Project(job.project.clone());
        self.clocks.start(key.clone());
        let result = self
            .services
            .mojo_executor
            .execute(&self.session, project, &executions);
        self.clocks.stop(key);

        result.map_err(|source| BuildError::Mojo {
            project: job.project.to_string(),
            step: job.name.clone(),
            source,
        })
    }

    /// Report the project's outcome from the state of its other steps.
    fn teardown(&self, job: &StepJob) -> std::result::Result<(), BuildError> {
        let errors: Vec<BuildError> = job.siblings.iter().filter_map(|s| s.failure()).collect();
        if let Some(error) = BuildError::combine(errors) {
            self.handle_build_error(&job.project, &error);
            return Err(error);
        }

        let (wall_time, exec_time) = self.clocks.times(&ClockKey::Project(job.project.clone()));
        let all_executed = job
            .siblings
            .iter()
            .all(|s| s.status() == StepStatus::Executed);
        let (outcome, event) = if all_executed {
            (
                BuildOutcome::Success,
                ExecutionEvent::ProjectSucceeded {
                    project: job.project.clone(),
                },
            )
        } else {
            (
                BuildOutcome::Skipped,
                ExecutionEvent::ProjectSkipped {
                    project: job.project.clone(),
                },
            )
        };

        self.reactor.result().add_build_summary(BuildSummary {
            project: job.project.clone(),
            wall_time,
            exec_time,
            outcome,
        });
        self.services.listener.on_event(&event);
        Ok(())
    }

    /// Record a project failure and apply the failure policy.
    fn handle_build_error(&self, project: &ProjectId, error: &BuildError) {
        let result = self.reactor.result();
        result.add_exception(error.clone());

        let (wall_time, exec_time) = self.clocks.times(&ClockKey::Project(project.clone()));
        result.add_build_summary(BuildSummary {
            project: project.clone(),
            wall_time,
            exec_time,
            outcome: BuildOutcome::Failure(error.clone()),
        });

        if !error.is_fatal() {
            self.services.listener.on_event(&ExecutionEvent::ProjectFailed {
                project: project.clone(),
                error: error.clone(),
            });
        }
        self.apply_failure_policy(project, error);
    }

    fn apply_failure_policy(&self, project: &ProjectId, error: &BuildError) {
        let status = self.reactor.status();
        if error.is_fatal() {
            status.halt();
            return;
        }
        match self.session.request().failure_behaviour {
            FailureBehaviour::FailFast => status.halt(),
            FailureBehaviour::FailAtEnd => status.black_list(project),
            FailureBehaviour::FailNever => {}
        }
    }

    async fn complete_step(&self, job: &StepJob, outcome: std::result::Result<(), BuildError>) {
        match outcome {
            Ok(()) => {
                let status = if job.report_skipped {
                    StepStatus::Skipped
                } else {
                    StepStatus::Executed
                };
                job.state.compare_and_set(StepStatus::Scheduled, status);
                debug!(project = %job.project_name, step = %job.name, status = %status, "step finished");
            }
            Err(error) => {
                if job.kind != StepKind::Teardown {
                    warn!(project = %job.project_name, step = %job.name, error = %error, "step failed");
                    job.state.set_failure(error.clone());
                    self.apply_failure_policy(&job.project, &error);
                }
                job.state.compare_and_set(StepStatus::Scheduled, StepStatus::Failed);
            }
        }

        if job.next_is_planning {
            let mut plan = self.plan.write().await;
            self.run_planner(&mut plan);
        }
    }

    /// Plan every ready project. Returns whether any PLAN step was taken.
    fn run_planner(&self, plan: &mut BuildPlan) -> bool {
        let planner = Planner::new(
            &self.session,
            self.services.resolver.as_ref(),
            self.services.lifecycles.as_ref(),
            self.threads,
        );
        let outcome = planner.plan(plan);

        for failure in outcome.failures {
            error!(
                project = %plan.project_name(&failure.project),
                error = %failure.error,
                "build planning failed"
            );
            let error = BuildError::Planning {
                project: failure.project.to_string(),
                message: failure.error.to_string(),
            };
            let state = Arc::clone(plan.node(failure.step).state());
            state.set_failure(error.clone());
            self.apply_failure_policy(&failure.project, &error);
            state.compare_and_set(StepStatus::Scheduled, StepStatus::Failed);
        }
        outcome.planned > 0
    }

    /// Steps left non-terminal mean the plan could not make progress; the
    /// build is recorded as failed.
    async fn report_unfinished(&self) {
        let plan = self.plan.read().await;
        let unfinished: Vec<String> = plan
            .all_steps()
            .filter(|id| !plan.node(*id).status().is_terminal())
            .map(|id| plan.node(id).to_string())
            .collect();
        if unfinished.is_empty() {
            return;
        }
        error!(
            count = unfinished.len(),
            steps = ?unfinished,
            "build finished with steps that never became ready"
        );
        self.reactor.status().halt();
        self.reactor
            .result()
            .add_exception(BuildError::Stalled { steps: unfinished });
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload: Box<dyn Any + Send> = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
