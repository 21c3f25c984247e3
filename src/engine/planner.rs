// src/engine/planner.rs

//! Dynamic plan expansion.
//!
//! When a project's PLAN step becomes ready, the planner binds the project's
//! plugin executions to its phase steps and splices a sub-plan in front of
//! every execution that forks a goal or a lifecycle phase. The scheduler
//! calls it with the plan's write lock held.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{Level, debug, warn};

use crate::engine::Session;
use crate::engine::mapping::PlanCalculator;
use crate::errors::{Result, WeaveError};
use crate::lifecycle::phases::PACKAGE;
use crate::lifecycle::{AFTER, AT, DEFAULT, Lifecycle, LifecycleRegistry, main_phase};
use crate::plan::{BuildPlan, BuildStep, StepId, StepKind, StepStatus, TEARDOWN, fork_prefix};
use crate::plugin::{LifecycleOverlay, MojoDescriptor, MojoExecution, MojoResolver, PluginDescriptor};
use crate::project::ProjectId;
use crate::types::ExecutionSource;

/// A project whose planning failed. Its PLAN step is left SCHEDULED.
#[derive(Debug)]
pub struct PlanningFailure {
    pub step: StepId,
    pub project: ProjectId,
    pub error: WeaveError,
}

#[derive(Debug, Default)]
pub struct PlanningOutcome {
    /// PLAN steps taken out of PLANNING by this pass.
    pub planned: usize,
    pub failures: Vec<PlanningFailure>,
}

pub struct Planner<'a> {
    session: &'a Session,
    resolver: &'a dyn MojoResolver,
    lifecycles: &'a dyn LifecycleRegistry,
    threads: usize,
}

impl<'a> Planner<'a> {
    pub fn new(
        session: &'a Session,
        resolver: &'a dyn MojoResolver,
        lifecycles: &'a dyn LifecycleRegistry,
        threads: usize,
    ) -> Self {
        Self {
            session,
            resolver,
            lifecycles,
            threads,
        }
    }

    /// Plan every project whose PLAN step has all predecessors executed.
    pub fn plan(&self, plan: &mut BuildPlan) -> PlanningOutcome {
        let ready: Vec<StepId> = plan
            .all_steps()
            .filter(|id| {
                let step = plan.node(*id);
                step.kind == StepKind::Plan
                    && step.status() == StepStatus::Planning
                    && plan
                        .predecessors(*id)
                        .all(|p| plan.node(p).status() == StepStatus::Executed)
            })
            .collect();

        let mut outcome = PlanningOutcome::default();
        for id in ready {
            let state = Arc::clone(plan.node(id).state());
            if !state.compare_and_set(StepStatus::Planning, StepStatus::Scheduled) {
                continue;
            }
            outcome.planned += 1;

            let project = plan.node(id).project.clone();
            match self.plan_project(plan, &project) {
                Ok(()) => {
                    self.log_plan(plan, &project);
                    state.compare_and_set(StepStatus::Scheduled, StepStatus::Executed);
                }
                Err(error) => outcome.failures.push(PlanningFailure {
                    step: id,
                    project,
                    error,
                }),
            }
        }

        if outcome.planned > 0 {
            self.check_thread_safety(plan);
            self.check_unbound_versions(plan);
        }
        outcome
    }

    /// Bind `project`'s executions and splice in every fork they declare.
    pub fn plan_project(&self, plan: &mut BuildPlan, project: &ProjectId) -> Result<()> {
        self.bind_executions(plan, project, &[], true)?;

        let steps: Vec<StepId> = plan.steps(project).collect();
        for id in steps {
            let executions: Vec<MojoExecution> = plan.node(id).executions().cloned().collect();
            for execution in executions {
                let mut stack = Vec::new();
                let Some(sub) = self.compute_fork_plan(project, &execution, &mut stack)? else {
                    continue;
                };

                let modules: Vec<ProjectId> = sub
                    .projects()
                    .iter()
                    .filter(|p| *p != project)
                    .cloned()
                    .collect();
                let prefix = unique_fork_prefix(plan, &sub, &execution.execution_id);
                debug!(
                    project = %plan.project_name(project),
                    step = %plan.node(id).name,
                    execution = %execution,
                    steps = sub.len(),
                    "splicing forked execution"
                );
                plan.splice_before(id, sub.prefixed(&prefix));
                for module in modules {
                    close_fork_in_module(plan, &module, &prefix);
                }
            }
        }
        Ok(())
    }

    fn upstreams(&self, project: &ProjectId) -> Vec<ProjectId> {
        self.session.graph().upstream_projects(project, false)
    }

    /// Bind the plugin executions declared by `project` onto the steps of
    /// `plan`. Goals listed in `skip` are left out.
    fn bind_executions(
        &self,
        plan: &mut BuildPlan,
        project: &ProjectId,
        skip: &[String],
        link_dependencies: bool,
    ) -> Result<()> {
        let model = self
            .session
            .project(project)
            .ok_or_else(|| WeaveError::ProjectNotFound(project.to_string()))?;

        for plugin in &model.plugins {
            for declared in &plugin.executions {
                for goal in &declared.goals {
                    let descriptor = self.resolver.mojo_descriptor(model, plugin, goal)?;
                    if skip.contains(&descriptor.id()) {
                        continue;
                    }
                    let Some(phase) = declared.phase.clone().or_else(|| descriptor.phase.clone())
                    else {
                        continue;
                    };

                    let target = bound_phase(plan, &phase);
                    let Some(step) = plan.step(project, &target) else {
                        continue;
                    };

                    let mut execution = MojoExecution::new(Arc::clone(&descriptor), &declared.id);
                    execution.lifecycle_phase = Some(phase);
                    execution.configuration = declared.configuration.clone();
                    let bound = plan.node_mut(step).add_execution(execution, declared.priority);

                    if bound && link_dependencies && descriptor.requires_dependencies() {
                        for upstream in plan.upstreams(project).to_vec() {
                            if let Some(packaged) = plan.step(&upstream, &format!("{AFTER}{PACKAGE}")) {
                                plan.execute_after(step, packaged);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Sub-plan forked by `execution`, or `None` when it does not fork.
    ///
    /// `stack` holds the goals currently being forked; forking one of them
    /// again is an error.
    fn compute_fork_plan(
        &self,
        project: &ProjectId,
        execution: &MojoExecution,
        stack: &mut Vec<String>,
    ) -> Result<Option<BuildPlan>> {
        let descriptor = &execution.descriptor;
        if !descriptor.forks() {
            return Ok(None);
        }

        let id = descriptor.id();
        if stack.contains(&id) {
            return Err(WeaveError::ConfigError(format!(
                "goal {id} forks itself through {}",
                stack.join(" -> ")
            )));
        }
        stack.push(id);
        let sub = self.fork_plan(project, execution, stack);
        stack.pop();
        sub.map(Some)
    }

    fn fork_plan(
        &self,
        project: &ProjectId,
        execution: &MojoExecution,
        stack: &mut Vec<String>,
    ) -> Result<BuildPlan> {
        let descriptor = &execution.descriptor;
        let plugin = self.resolver.plugin_descriptor(&descriptor.plugin_key)?;

        let mut sub = match (
            non_empty(&descriptor.execute_goal),
            non_empty(&descriptor.execute_phase),
        ) {
            (Some(goal), _) => self.fork_goal_plan(project, descriptor, &plugin, goal)?,
            (None, Some(phase)) => self.fork_phase_plan(project, execution, &plugin, phase, stack)?,
            (None, None) => BuildPlan::new(),
        };

        self.expand_nested_forks(&mut sub, stack)?;
        Ok(sub)
    }

    /// A single step running `goal` of the same plugin, for the project and,
    /// when the forking goal aggregates, for every module it collects.
    fn fork_goal_plan(
        &self,
        project: &ProjectId,
        descriptor: &MojoDescriptor,
        plugin: &PluginDescriptor,
        goal: &str,
    ) -> Result<BuildPlan> {
        let forked = plugin
            .mojo(goal)
            .cloned()
            .ok_or_else(|| WeaveError::MojoNotFound {
                goal: goal.to_string(),
                plugin: plugin.key(),
            })?;

        let mut targets = vec![project.clone()];
        if descriptor.aggregator {
            self.collect_modules(project, &mut targets);
        }

        let mut sub = BuildPlan::new();
        for target in targets {
            sub.add_project(target.clone(), self.upstreams(&target));
            let mut execution = MojoExecution::new(Arc::clone(&forked), goal);
            execution.source = ExecutionSource::Fork;
            let mut step = BuildStep::new(target, goal, None);
            step.add_execution(execution, 0);
            sub.add_step(step);
        }
        Ok(sub)
    }

    fn collect_modules(&self, project: &ProjectId, out: &mut Vec<ProjectId>) {
        let Some(model) = self.session.project(project) else {
            return;
        };
        for module in &model.modules {
            if self.session.project(module).is_some() && !out.contains(module) {
                out.push(module.clone());
                self.collect_modules(module, out);
            }
        }
    }

    /// The lifecycle truncated at `phase`, with the project's executions and
    /// the plugin's overlay goals bound to it.
    fn fork_phase_plan(
        &self,
        project: &ProjectId,
        execution: &MojoExecution,
        plugin: &PluginDescriptor,
        phase: &str,
        stack: &[String],
    ) -> Result<BuildPlan> {
        let (lifecycle, overlay) = self.fork_lifecycle(plugin, execution, phase)?;
        let calculator = PlanCalculator::new(self.session, self.resolver, self.lifecycles);
        let entry = (project.clone(), self.upstreams(project));
        let mut sub = calculator.calculate_lifecycle_mappings(&[entry], lifecycle, phase)?;

        self.bind_executions(&mut sub, project, stack, false)?;
        if let Some(overlay) = overlay {
            bind_overlay(&mut sub, project, plugin, overlay, stack)?;
        }
        Ok(sub)
    }

    /// Lifecycle used by a phase fork, plus the plugin overlay when the
    /// forking goal names one.
    fn fork_lifecycle<'p>(
        &self,
        plugin: &'p PluginDescriptor,
        execution: &MojoExecution,
        phase: &str,
    ) -> Result<(&'a Lifecycle, Option<&'p LifecycleOverlay>)> {
        let descriptor = &execution.descriptor;
        let containing = self.lifecycle_containing(phase);

        if let Some(id) = non_empty(&descriptor.execute_lifecycle) {
            if let Some(overlay) = plugin.lifecycle_overlay(id) {
                let base = containing
                    .or_else(|| self.lifecycles.lookup(DEFAULT))
                    .ok_or_else(|| WeaveError::LifecycleNotFound(DEFAULT.to_string()))?;
                return Ok((base, Some(overlay)));
            }
            return self
                .lifecycles
                .lookup(id)
                .map(|l| (l, None))
                .ok_or_else(|| WeaveError::LifecycleNotFound(id.to_string()));
        }

        let from_execution = execution
            .lifecycle_phase
            .as_deref()
            .and_then(|p| self.lifecycle_containing(p));
        let chosen = from_execution.or_else(|| self.lifecycles.lookup(DEFAULT));

        // A phase outside the chosen lifecycle is taken from the lifecycle
        // that declares it.
        match (chosen, containing) {
            (Some(l), _) if l.has_phase(main_phase(&l.resolve_alias(phase))) => Ok((l, None)),
            (_, Some(l)) => Ok((l, None)),
            (Some(l), None) => Ok((l, None)),
            (None, None) => Err(WeaveError::LifecycleNotFound(DEFAULT.to_string())),
        }
    }

    fn lifecycle_containing(&self, phase: &str) -> Option<&'a Lifecycle> {
        let resolved = self.lifecycles.resolve_alias(phase);
        self.lifecycles.lifecycle_for_phase(main_phase(&resolved))
    }

    /// Splice the forks declared inside a fork sub-plan into it.
    fn expand_nested_forks(&self, sub: &mut BuildPlan, stack: &mut Vec<String>) -> Result<()> {
        let steps: Vec<StepId> = sub.all_steps().collect();
        for id in steps {
            let project = sub.node(id).project.clone();
            let executions: Vec<MojoExecution> = sub.node(id).executions().cloned().collect();
            for execution in executions {
                if let Some(nested) = self.compute_fork_plan(&project, &execution, stack)? {
                    let prefix = unique_fork_prefix(sub, &nested, &execution.execution_id);
                    sub.splice_before(id, nested.prefixed(&prefix));
                }
            }
        }
        Ok(())
    }

    /// Warn when a concurrent build binds goals not marked thread-safe.
    ///
    /// Returns the offending goals; empty for a serial build.
    fn check_thread_safety(&self, plan: &BuildPlan) -> BTreeSet<String> {
        if self.threads <= 1 {
            return BTreeSet::new();
        }

        let mut goals = BTreeSet::new();
        let mut plugins = BTreeSet::new();
        for id in plan.all_steps() {
            for execution in plan.node(id).executions() {
                let descriptor = &execution.descriptor;
                if descriptor.thread_safe {
                    continue;
                }
                goals.insert(descriptor.id());
                plugins.insert(match &descriptor.plugin_version {
                    Some(v) => format!("{}:{v}", descriptor.plugin_key),
                    None => descriptor.plugin_key.clone(),
                });
            }
        }
        if goals.is_empty() {
            return goals;
        }

        if tracing::enabled!(Level::DEBUG) {
            warn!(
                threads = self.threads,
                goals = ?goals,
                "concurrent build requested, but these goals are not marked thread-safe"
            );
        } else {
            warn!(
                threads = self.threads,
                plugins = ?plugins,
                "concurrent build requested, but these plugins have goals not marked thread-safe; \
                 enable debug logging to see which goals"
            );
        }
        goals
    }

    /// Warn about default-binding plugins bound without a pinned version.
    ///
    /// Returns their artifact ids.
    fn check_unbound_versions(&self, plan: &BuildPlan) -> BTreeSet<String> {
        let mut unpinned = BTreeSet::new();
        for id in plan.all_steps() {
            let step = plan.node(id);
            let Some(model) = self.session.project(&step.project) else {
                continue;
            };
            for execution in step.executions() {
                if let Some(plugin) = model.plugin(&execution.descriptor.plugin_key) {
                    if plugin.default_binding && plugin.version.is_none() {
                        unpinned.insert(plugin.artifact_id.clone());
                    }
                }
            }
        }
        if !unpinned.is_empty() {
            warn!(
                plugins = ?unpinned,
                "version not locked for default-binding plugins; pin their versions in the reactor config"
            );
        }
        unpinned
    }

    fn log_plan(&self, plan: &BuildPlan, project: &ProjectId) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        let name = plan.project_name(project);
        debug!(project = %name, "=== build plan ===");
        for id in plan.sorted_nodes() {
            let step = plan.node(*id);
            if &step.project != project {
                continue;
            }
            let after: Vec<String> = plan
                .predecessors(*id)
                .map(|p| plan.node(p).to_string())
                .collect();
            let executions: Vec<String> = step.executions().map(ToString::to_string).collect();
            debug!(
                project = %name,
                step = %step.name,
                status = %step.status(),
                pruned = step.is_pruned(),
                after = ?after,
                executions = ?executions,
                "plan step"
            );
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Step name an execution bound to `phase` lands on.
fn bound_phase(plan: &BuildPlan, phase: &str) -> String {
    let resolved = plan.aliases().get(phase).map(String::as_str).unwrap_or(phase);
    resolved.strip_prefix(AT).unwrap_or(resolved).to_string()
}

fn bind_overlay(
    sub: &mut BuildPlan,
    project: &ProjectId,
    plugin: &PluginDescriptor,
    overlay: &LifecycleOverlay,
    stack: &[String],
) -> Result<()> {
    for (phase, goals) in &overlay.phases {
        let target = bound_phase(sub, phase);
        let Some(step) = sub.step(project, &target) else {
            continue;
        };
        for goal in goals {
            let descriptor = plugin
                .mojo(goal)
                .cloned()
                .ok_or_else(|| WeaveError::MojoNotFound {
                    goal: goal.clone(),
                    plugin: plugin.key(),
                })?;
            if stack.contains(&descriptor.id()) {
                continue;
            }
            let mut execution = MojoExecution::new(descriptor, format!("{}-{goal}", overlay.id));
            execution.lifecycle_phase = Some(phase.clone());
            execution.source = ExecutionSource::Fork;
            sub.node_mut(step).add_execution(execution, 0);
        }
    }
    Ok(())
}

/// `fork(<id>):`, or `fork(<id>#n):` when the plain prefix is already used
/// by a project of `sub`.
fn unique_fork_prefix(plan: &BuildPlan, sub: &BuildPlan, execution_id: &str) -> String {
    let taken = |prefix: &str| {
        sub.projects()
            .iter()
            .any(|p| plan.steps(p).any(|s| plan.node(s).name.starts_with(prefix)))
    };

    let base = fork_prefix(execution_id);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| fork_prefix(&format!("{execution_id}#{n}")))
        .find(|prefix| !taken(prefix))
        .unwrap_or(base)
}

/// Make an aggregated module's teardown wait on the fork steps spliced into
/// it, unless the module already finished.
fn close_fork_in_module(plan: &mut BuildPlan, module: &ProjectId, prefix: &str) {
    let Some(teardown) = plan.step(module, TEARDOWN) else {
        return;
    };
    if plan.node(teardown).status().is_terminal() {
        return;
    }
    let lasts: Vec<StepId> = plan
        .last_steps(module)
        .into_iter()
        .filter(|s| plan.node(*s).name.starts_with(prefix))
        .collect();
    for last in lasts {
        plan.execute_after(teardown, last);
    }
}
