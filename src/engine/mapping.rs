// src/engine/mapping.rs

//! Initial plan calculation.
//!
//! Lifecycle phases expand into `before:X` / `X` / `after:X` step triplets per
//! project, truncated at the requested phase. Goals requested on the command
//! line become one ad-hoc step per project. Task segments are chained with
//! [`BuildPlan::then`] and every project is wrapped in PLAN / SETUP /
//! TEARDOWN.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::engine::Session;
use crate::engine::segments::{Task, TaskSegment};
use crate::errors::{Result, WeaveError};
use crate::lifecycle::phases::READY;
use crate::lifecycle::{
    AFTER, AT, BEFORE, Lifecycle, LifecycleRegistry, Link, LinkKind, Pointer, main_phase,
};
use crate::plan::{BuildPlan, BuildStep, PLAN, SETUP, StepId, TEARDOWN};
use crate::plugin::{GoalSpec, MojoExecution, MojoResolver};
use crate::project::ProjectId;
use crate::types::ExecutionSource;

/// A project together with its direct upstream projects.
pub type ProjectEntry = (ProjectId, Vec<ProjectId>);

pub struct PlanCalculator<'a> {
    session: &'a Session,
    resolver: &'a dyn MojoResolver,
    lifecycles: &'a dyn LifecycleRegistry,
}

impl<'a> PlanCalculator<'a> {
    pub fn new(
        session: &'a Session,
        resolver: &'a dyn MojoResolver,
        lifecycles: &'a dyn LifecycleRegistry,
    ) -> Self {
        Self {
            session,
            resolver,
            lifecycles,
        }
    }

    fn entry(&self, project: &ProjectId) -> ProjectEntry {
        (
            project.clone(),
            self.session.graph().upstream_projects(project, false),
        )
    }

    /// Every project of the session in build order.
    pub fn all_projects(&self) -> Vec<ProjectEntry> {
        self.session
            .projects()
            .iter()
            .map(|p| self.entry(&p.id))
            .collect()
    }

    pub fn build_initial_plan(&self, segments: &[TaskSegment]) -> Result<BuildPlan> {
        let all = self.all_projects();

        let mut plan = BuildPlan::new();
        for (project, upstreams) in &all {
            plan.add_project(project.clone(), upstreams.clone());
        }

        for segment in segments {
            let projects = if segment.aggregating {
                vec![self.entry(self.session.top_level_project())]
            } else {
                all.clone()
            };
            plan.then(self.calculate_mojo_executions(&projects, &segment.tasks)?);
        }

        for (project, _) in &all {
            self.wrap_project(&mut plan, project);
        }

        debug!(
            projects = all.len(),
            segments = segments.len(),
            steps = plan.len(),
            "computed initial build plan"
        );
        Ok(plan)
    }

    /// PLAN -> SETUP -> (existing steps) -> TEARDOWN.
    fn wrap_project(&self, plan: &mut BuildPlan, project: &ProjectId) {
        let firsts = plan.first_steps(project);
        let lasts = plan.last_steps(project);

        let plan_step = plan.add_step(BuildStep::new(project.clone(), PLAN, None));
        let setup = plan.add_step(BuildStep::new(project.clone(), SETUP, None));
        let teardown = plan.add_step(BuildStep::new(project.clone(), TEARDOWN, None));
        plan.execute_after(setup, plan_step);
        plan.execute_after(teardown, setup);
        for first in firsts {
            plan.execute_after(first, setup);
        }
        for last in lasts {
            plan.execute_after(teardown, last);
        }

        // Plugins built inside the reactor must be ready before planning.
        let Some(model) = self.session.project(project) else {
            return;
        };
        for plugin in &model.plugins {
            for provider in self.session.projects() {
                if provider.id == *project || !provider.provides(plugin) {
                    continue;
                }
                if let Some(ready) = plan.step(&provider.id, READY) {
                    trace!(project = %project, provider = %provider.id, "planning waits on plugin provider");
                    plan.execute_after(plan_step, ready);
                }
            }
        }
    }

    /// Plan for one segment: each task chained after the previous one.
    pub fn calculate_mojo_executions(
        &self,
        projects: &[ProjectEntry],
        tasks: &[Task],
    ) -> Result<BuildPlan> {
        let mut plan = BuildPlan::new();
        for (project, upstreams) in projects {
            plan.add_project(project.clone(), upstreams.clone());
        }

        for task in tasks {
            let next = match task {
                Task::Goal(goal) => self.goal_plan(projects, goal)?,
                Task::Lifecycle(phase) => {
                    self.calculate_lifecycle_mappings_for_phase(projects, phase)?
                }
            };
            plan.then(next);
        }
        Ok(plan)
    }

    /// One step per project, named after the goal as typed, holding a single
    /// command-line execution.
    fn goal_plan(&self, projects: &[ProjectEntry], goal: &str) -> Result<BuildPlan> {
        let spec = GoalSpec::parse(goal)?;

        let mut plan = BuildPlan::new();
        for (project, upstreams) in projects {
            let model = self
                .session
                .project(project)
                .ok_or_else(|| WeaveError::ProjectNotFound(project.to_string()))?;
            let descriptor = self.resolver.cli_mojo_descriptor(model, &spec)?;

            let mut execution = MojoExecution::new(descriptor, spec.execution_id());
            execution.source = ExecutionSource::Cli;

            plan.add_project(project.clone(), upstreams.clone());
            let mut step = BuildStep::new(project.clone(), goal, None);
            step.add_execution(execution, 0);
            plan.add_step(step);
        }
        Ok(plan)
    }

    /// Lifecycle plan for `phase`, looked up across every registered
    /// lifecycle.
    pub fn calculate_lifecycle_mappings_for_phase(
        &self,
        projects: &[ProjectEntry],
        phase: &str,
    ) -> Result<BuildPlan> {
        let resolved = self.lifecycles.resolve_alias(phase);
        let lifecycle = self
            .lifecycles
            .lifecycle_for_phase(main_phase(&resolved))
            .ok_or_else(|| WeaveError::LifecyclePhaseNotFound {
                phase: phase.to_string(),
                available: self.lifecycles.available_phases(),
            })?;
        self.calculate_lifecycle_mappings(projects, lifecycle, &resolved)
    }

    /// Expand `lifecycle` for `projects`, truncated at `phase`.
    ///
    /// `before:X` and `after:X` end the plan at that exact step, `at:X` ends
    /// it at the phase body `X` and a bare `X` runs through `after:X`. Steps
    /// past the end stay in the plan as pruned steps so ordering holds, but
    /// they never receive executions.
    pub fn calculate_lifecycle_mappings(
        &self,
        projects: &[ProjectEntry],
        lifecycle: &Lifecycle,
        phase: &str,
    ) -> Result<BuildPlan> {
        let resolved = lifecycle.resolve_alias(phase);
        let main = main_phase(&resolved);
        if !lifecycle.has_phase(main) {
            return Err(WeaveError::LifecyclePhaseNotFound {
                phase: phase.to_string(),
                available: self.lifecycles.available_phases(),
            });
        }

        let end_name = if resolved.starts_with(BEFORE) || resolved.starts_with(AFTER) {
            resolved.clone()
        } else if let Some(body) = resolved.strip_prefix(AT) {
            body.to_string()
        } else {
            format!("{AFTER}{resolved}")
        };

        let phases = lifecycle.all_phases();
        let mut plan = BuildPlan::new();

        for (project, upstreams) in projects {
            plan.add_project(project.clone(), upstreams.clone());

            for phase in &phases {
                let name = &phase.name;
                let before = plan.add_step(step(project, format!("{BEFORE}{name}"), name));
                let body = plan.add_step(step(project, name.clone(), name));
                let after = plan.add_step(step(project, format!("{AFTER}{name}"), name));
                plan.execute_after(body, before);
                plan.execute_after(after, body);
            }

            for phase in &phases {
                let before = plan.required_step(project, &format!("{BEFORE}{}", phase.name))?;
                let after = plan.required_step(project, &format!("{AFTER}{}", phase.name))?;
                for child in &phase.phases {
                    let child_before =
                        plan.required_step(project, &format!("{BEFORE}{}", child.name))?;
                    let child_after =
                        plan.required_step(project, &format!("{AFTER}{}", child.name))?;
                    plan.execute_after(child_before, before);
                    plan.execute_after(after, child_after);
                }

                for link in phase.links.iter().filter(|l| l.pointer.is_project()) {
                    let other = link.pointer.phase();
                    let (waiting, waited) = match link.kind {
                        LinkKind::After => (phase.name.as_str(), other),
                        LinkKind::Before => (other, phase.name.as_str()),
                    };
                    let waiting = plan.required_step(project, &format!("{BEFORE}{waiting}"))?;
                    let waited = plan.required_step(project, &format!("{AFTER}{waited}"))?;
                    plan.execute_after(waiting, waited);
                }
            }

            let end = plan.required_step(project, &end_name)?;
            prune_after(&mut plan, project, end);
        }

        for (project, upstreams) in projects {
            for phase in &phases {
                for link in phase.links.iter().filter(|l| !l.pointer.is_project()) {
                    let linked: Vec<ProjectId> = match &link.pointer {
                        Pointer::Project { .. } => continue,
                        Pointer::Dependencies { .. } => upstreams.clone(),
                        Pointer::Children { .. } => self
                            .session
                            .project(project)
                            .map(|p| p.modules.clone())
                            .unwrap_or_default(),
                    };
                    for other in linked {
                        self.link_projects(&mut plan, project, &phase.name, &other, link)?;
                    }
                }
            }
        }

        for alias in &lifecycle.aliases {
            plan.add_alias(alias.v3_phase.clone(), alias.v4_phase.clone());
        }
        Ok(plan)
    }

    fn link_projects(
        &self,
        plan: &mut BuildPlan,
        project: &ProjectId,
        phase: &str,
        other: &ProjectId,
        link: &Link,
    ) -> Result<()> {
        let other_phase = link.pointer.phase();
        match link.kind {
            LinkKind::After => {
                if let Some(waited) = plan.step(other, &format!("{AFTER}{other_phase}")) {
                    let waiting = plan.required_step(project, &format!("{BEFORE}{phase}"))?;
                    plan.execute_after(waiting, waited);
                }
            }
            LinkKind::Before => {
                if let Some(waiting) = plan.step(other, &format!("{BEFORE}{other_phase}")) {
                    let waited = plan.required_step(project, &format!("{AFTER}{phase}"))?;
                    plan.execute_after(waiting, waited);
                }
            }
        }
        Ok(())
    }
}

fn step(project: &ProjectId, name: String, phase: &str) -> BuildStep {
    BuildStep::new(project.clone(), name, Some(phase.to_string()))
}

/// Prune every step of `project` that is not needed to reach `end`.
///
/// An `after:X` step is kept whenever its `before:X` is, so a started phase
/// always closes.
fn prune_after(plan: &mut BuildPlan, project: &ProjectId, end: StepId) {
    let mut keep: HashSet<StepId> = plan.all_predecessors(end);
    keep.insert(end);

    let closing: Vec<StepId> = keep
        .iter()
        .filter_map(|id| plan.node(*id).name.strip_prefix(BEFORE))
        .filter_map(|phase| plan.step(project, &format!("{AFTER}{phase}")))
        .collect();
    keep.extend(closing);

    let pruned: Vec<StepId> = plan.steps(project).filter(|id| !keep.contains(id)).collect();
    for id in pruned {
        plan.node_mut(id).set_pruned(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionRequest;
    use crate::lifecycle::DefaultLifecycleRegistry;
    use crate::lifecycle::phases::{CLEAN, COMPILE, INSTALL, PACKAGE, TEST};
    use crate::plugin::{InMemoryMojoResolver, MojoDescriptor, PluginDescriptor};
    use crate::plan::StepKind;
    use crate::project::Project;
    use std::sync::Arc;

    fn session(projects: Vec<Project>) -> Session {
        Session::new(projects, ExecutionRequest::default()).unwrap()
    }

    fn lifecycle_segment(phases: &[&str]) -> TaskSegment {
        TaskSegment::new(
            false,
            phases.iter().map(|p| Task::Lifecycle(p.to_string())).collect(),
        )
    }

    fn resolver() -> InMemoryMojoResolver {
        let mut compile = MojoDescriptor::new("org.example.plugins:compiler", "compile");
        compile.phase = Some(COMPILE.to_string());
        InMemoryMojoResolver::new(vec![PluginDescriptor {
            group_id: "org.example.plugins".into(),
            artifact_id: "compiler".into(),
            mojos: vec![Arc::new(compile)],
            ..Default::default()
        }])
    }

    fn is_pruned(plan: &BuildPlan, project: &ProjectId, name: &str) -> bool {
        plan.node(plan.step(project, name).unwrap()).is_pruned()
    }

    #[test]
    fn package_expands_and_prunes_later_phases() {
        let core = Project::new("org.example", "core", "1.0");
        let id = core.id.clone();
        let session = session(vec![core]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let plan = calc
            .calculate_lifecycle_mappings_for_phase(&calc.all_projects(), PACKAGE)
            .unwrap();

        assert!(!is_pruned(&plan, &id, COMPILE));
        assert!(!is_pruned(&plan, &id, "after:package"));
        assert!(!is_pruned(&plan, &id, "after:all"));
        assert!(is_pruned(&plan, &id, TEST));
        assert!(is_pruned(&plan, &id, INSTALL));

        let compile = plan.step(&id, COMPILE).unwrap();
        let before = plan.step(&id, "before:compile").unwrap();
        assert!(plan.predecessors(compile).any(|p| p == before));
        assert_eq!(plan.node(compile).kind, StepKind::Phase);
    }

    #[test]
    fn at_phase_keeps_the_phase_body() {
        let core = Project::new("org.example", "core", "1.0");
        let id = core.id.clone();
        let session = session(vec![core]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let plan = calc
            .calculate_lifecycle_mappings_for_phase(&calc.all_projects(), "at:compile")
            .unwrap();
        assert!(!is_pruned(&plan, &id, COMPILE));
        assert!(!is_pruned(&plan, &id, "after:compile"));
        assert!(is_pruned(&plan, &id, PACKAGE));
    }

    #[test]
    fn dependency_links_cross_projects() {
        let api = Project::new("org.example", "api", "1.0");
        let mut app = Project::new("org.example", "app", "1.0");
        app.dependencies.push(api.id.clone());
        let (api_id, app_id) = (api.id.clone(), app.id.clone());
        let session = session(vec![app, api]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let plan = calc
            .calculate_lifecycle_mappings_for_phase(&calc.all_projects(), PACKAGE)
            .unwrap();
        let app_compile = plan.step(&app_id, "before:compile").unwrap();
        let api_ready = plan.step(&api_id, "after:ready").unwrap();
        assert!(plan.predecessors(app_compile).any(|p| p == api_ready));
    }

    #[test]
    fn unknown_phase_lists_available_phases() {
        let session = session(vec![Project::new("org.example", "core", "1.0")]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let err = calc
            .calculate_lifecycle_mappings_for_phase(&calc.all_projects(), "bogus")
            .unwrap_err();
        match err {
            WeaveError::LifecyclePhaseNotFound { phase, available } => {
                assert_eq!(phase, "bogus");
                assert!(available.contains("compile"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn initial_plan_wraps_projects_and_chains_segments() {
        let core = Project::new("org.example", "core", "1.0");
        let id = core.id.clone();
        let session = session(vec![core]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let plan = calc
            .build_initial_plan(&[lifecycle_segment(&[CLEAN, INSTALL])])
            .unwrap();

        let plan_step = plan.step(&id, PLAN).unwrap();
        let setup = plan.step(&id, SETUP).unwrap();
        let teardown = plan.step(&id, TEARDOWN).unwrap();
        assert!(plan.predecessors(setup).any(|p| p == plan_step));
        assert!(plan.predecessors(teardown).any(|p| p == setup));

        let before_clean = plan.step(&id, "before:clean").unwrap();
        assert!(plan.predecessors(before_clean).any(|p| p == setup));

        // default lifecycle starts after clean is done
        let after_clean = plan.step(&id, "after:clean").unwrap();
        let before_all = plan.step(&id, "before:all").unwrap();
        assert!(plan.predecessors(before_all).any(|p| p == after_clean));

        let after_all = plan.step(&id, "after:all").unwrap();
        assert!(plan.predecessors(teardown).any(|p| p == after_all));
    }

    #[test]
    fn goal_segment_creates_cli_steps() {
        let core = Project::new("org.example", "core", "1.0");
        let id = core.id.clone();
        let session = session(vec![core]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let segment = TaskSegment::new(false, vec![Task::Goal("compiler:compile@fast".into())]);
        let plan = calc.build_initial_plan(&[segment]).unwrap();

        let step = plan.node(plan.step(&id, "compiler:compile@fast").unwrap());
        assert_eq!(step.kind, StepKind::Goal);
        let execution = step.executions().next().unwrap();
        assert_eq!(execution.execution_id, "fast");
        assert_eq!(execution.source, ExecutionSource::Cli);
    }

    #[test]
    fn plugin_provider_must_be_ready_before_planning() {
        let tooling = Project::new("org.example.plugins", "compiler", "1.0");
        let mut app = Project::new("org.example", "app", "1.0");
        app.plugins.push(crate::project::Plugin::new("org.example.plugins", "compiler"));
        let (tooling_id, app_id) = (tooling.id.clone(), app.id.clone());
        let session = session(vec![tooling, app]);
        let registry = DefaultLifecycleRegistry::new();
        let resolver = resolver();
        let calc = PlanCalculator::new(&session, &resolver, &registry);

        let plan = calc.build_initial_plan(&[lifecycle_segment(&[PACKAGE])]).unwrap();
        let app_plan = plan.step(&app_id, PLAN).unwrap();
        let ready = plan.step(&tooling_id, READY).unwrap();
        assert!(plan.predecessors(app_plan).any(|p| p == ready));
    }
}
