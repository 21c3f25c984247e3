// src/engine/mod.rs

//! Reactor build engine.
//!
//! This module ties together:
//! - task segment calculation from the requested goals ([`segments`])
//! - the initial plan: lifecycle expansion and goal steps ([`mapping`])
//! - the planner that binds plugin executions and splices forks ([`planner`])
//! - the pure per-step scheduling decision ([`decision`])
//! - the driver that walks the plan on a bounded worker pool ([`context`])
//!
//! [`BuildPlanExecutor::execute`] is the entry point. Outcomes land in the
//! shared [`ExecutionResult`] of the [`ReactorContext`].

pub mod clock;
pub mod context;
pub mod decision;
pub mod events;
pub mod mapping;
pub mod planner;
pub mod result;
pub mod segments;
pub mod status;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{Result, WeaveError};
use crate::exec::{ConfiguratorRegistry, MojoExecutor};
use crate::lifecycle::LifecycleRegistry;
use crate::plan::BuildPlan;
use crate::plugin::MojoResolver;
use crate::project::{DefaultProjectDependencyGraph, Project, ProjectDependencyGraph, ProjectId};
use crate::types::FailureBehaviour;

pub use context::BuildContext;
pub use decision::{Decision, StepSnapshot, decide};
pub use events::{ExecutionEvent, ExecutionListener, LoggingListener};
pub use mapping::PlanCalculator;
pub use planner::Planner;
pub use result::{BuildOutcome, BuildSummary, ExecutionResult};
pub use segments::{Task, TaskSegment, calculate_task_segments};
pub use status::ReactorBuildStatus;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Requested worker count; capped by the number of projects.
    pub degree_of_concurrency: usize,
    pub failure_behaviour: FailureBehaviour,
}

impl Default for ExecutionRequest {
    fn default() -> Self {
        Self {
            degree_of_concurrency: 1,
            failure_behaviour: FailureBehaviour::FailFast,
        }
    }
}

/// The reactor being built: projects, their ordering and the request.
pub struct Session {
    projects: Vec<Arc<Project>>,
    by_id: HashMap<ProjectId, Arc<Project>>,
    graph: Arc<dyn ProjectDependencyGraph>,
    request: ExecutionRequest,
    top_level: ProjectId,
    parallel: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("projects", &self.projects.len())
            .field("request", &self.request)
            .field("top_level", &self.top_level)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session over `projects`, ordered by their declared dependencies.
    pub fn new(projects: Vec<Project>, request: ExecutionRequest) -> Result<Self> {
        let graph = DefaultProjectDependencyGraph::new(&projects)?;
        Self::with_graph(projects, Arc::new(graph), request)
    }

    pub fn with_graph(
        projects: Vec<Project>,
        graph: Arc<dyn ProjectDependencyGraph>,
        request: ExecutionRequest,
    ) -> Result<Self> {
        if projects.is_empty() {
            return Err(WeaveError::ConfigError(
                "the reactor must contain at least one project".to_string(),
            ));
        }

        // The top-level project is the first one nobody aggregates.
        let top_level = projects
            .iter()
            .find(|p| !projects.iter().any(|q| q.modules.contains(&p.id)))
            .unwrap_or(&projects[0])
            .id
            .clone();

        let by_id: HashMap<ProjectId, Arc<Project>> = projects
            .into_iter()
            .map(|p| (p.id.clone(), Arc::new(p)))
            .collect();
        let projects = graph
            .sorted_projects()
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .collect();

        Ok(Self {
            projects,
            by_id,
            graph,
            request,
            top_level,
            parallel: AtomicBool::new(false),
        })
    }

    pub fn with_top_level(mut self, project: &ProjectId) -> Result<Self> {
        if !self.by_id.contains_key(project) {
            return Err(WeaveError::ProjectNotFound(project.to_string()));
        }
        self.top_level = project.clone();
        Ok(self)
    }

    /// Projects in build order.
    pub fn projects(&self) -> &[Arc<Project>] {
        &self.projects
    }

    pub fn project(&self, id: &ProjectId) -> Option<&Arc<Project>> {
        self.by_id.get(id)
    }

    pub fn graph(&self) -> &Arc<dyn ProjectDependencyGraph> {
        &self.graph
    }

    pub fn request(&self) -> &ExecutionRequest {
        &self.request
    }

    pub fn top_level_project(&self) -> &ProjectId {
        &self.top_level
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel.load(Ordering::Acquire)
    }

    pub fn set_parallel(&self, parallel: bool) {
        self.parallel.store(parallel, Ordering::Release);
    }
}

/// Shared outcome and failure state of one reactor build.
#[derive(Debug, Clone)]
pub struct ReactorContext {
    result: Arc<ExecutionResult>,
    status: Arc<ReactorBuildStatus>,
}

impl ReactorContext {
    pub fn new(session: &Session) -> Self {
        Self {
            result: Arc::new(ExecutionResult::new()),
            status: Arc::new(ReactorBuildStatus::new(Arc::clone(session.graph()))),
        }
    }

    pub fn result(&self) -> &Arc<ExecutionResult> {
        &self.result
    }

    pub fn status(&self) -> &Arc<ReactorBuildStatus> {
        &self.status
    }
}

/// Collaborators used while planning and executing.
#[derive(Clone)]
pub struct Services {
    pub mojo_executor: Arc<dyn MojoExecutor>,
    pub listener: Arc<dyn ExecutionListener>,
    pub resolver: Arc<dyn MojoResolver>,
    pub lifecycles: Arc<dyn LifecycleRegistry>,
    pub configurators: Arc<ConfiguratorRegistry>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("configurators", &self.configurators)
            .finish_non_exhaustive()
    }
}

/// Builds a reactor by walking its build plan concurrently.
#[derive(Debug, Clone)]
pub struct BuildPlanExecutor {
    services: Services,
}

impl BuildPlanExecutor {
    pub fn new(
        mojo_executor: Arc<dyn MojoExecutor>,
        resolver: Arc<dyn MojoResolver>,
        lifecycles: Arc<dyn LifecycleRegistry>,
    ) -> Self {
        Self {
            services: Services {
                mojo_executor,
                listener: Arc::new(LoggingListener),
                resolver,
                lifecycles,
                configurators: Arc::new(ConfiguratorRegistry::new()),
            },
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ExecutionListener>) -> Self {
        self.services.listener = listener;
        self
    }

    pub fn with_configurators(mut self, configurators: ConfiguratorRegistry) -> Self {
        self.services.configurators = Arc::new(configurators);
        self
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Plan before any step runs: lifecycle expansion, goal steps and the
    /// PLAN / SETUP / TEARDOWN wrapping of every project.
    pub fn initial_plan(&self, session: &Session, segments: &[TaskSegment]) -> Result<BuildPlan> {
        PlanCalculator::new(
            session,
            self.services.resolver.as_ref(),
            self.services.lifecycles.as_ref(),
        )
        .build_initial_plan(segments)
    }

    /// Initial plan with every project's executions bound and forks
    /// expanded, without running anything.
    pub fn dry_run_plan(&self, session: &Session, segments: &[TaskSegment]) -> Result<BuildPlan> {
        let mut plan = self.initial_plan(session, segments)?;
        let planner = Planner::new(
            session,
            self.services.resolver.as_ref(),
            self.services.lifecycles.as_ref(),
            1,
        );
        for project in plan.projects().to_vec() {
            planner.plan_project(&mut plan, &project)?;
        }
        Ok(plan)
    }

    /// Build every project of `session`.
    ///
    /// Fails only if the initial plan cannot be computed (unknown phase,
    /// unresolvable command-line goal). Step failures, planning failures and
    /// skipped projects are recorded in `reactor`'s [`ExecutionResult`].
    pub async fn execute(
        &self,
        session: Arc<Session>,
        reactor: &ReactorContext,
        segments: &[TaskSegment],
    ) -> Result<()> {
        let context = BuildContext::new(self.services.clone(), session, reactor.clone(), segments)?;
        context.execute().await;
        Ok(())
    }
}
