// src/plan/build_plan.rs

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

use crate::errors::{Result, WeaveError};
use crate::plan::step::BuildStep;
use crate::project::ProjectId;

/// Index of a step inside its plan's arena.
pub type StepId = NodeIndex;

#[derive(Debug, Clone, Default)]
struct ProjectSteps {
    order: Vec<StepId>,
    by_name: HashMap<String, StepId>,
}

/// DAG of build steps keyed by `(project, step name)`.
///
/// Steps live in a petgraph arena; an edge `a -> b` means `b` runs after `a`.
/// Nodes are never removed, so [`StepId`]s stay valid for the lifetime of the
/// plan.
#[derive(Debug, Default)]
pub struct BuildPlan {
    graph: DiGraph<BuildStep, ()>,
    projects: Vec<ProjectId>,
    steps: HashMap<ProjectId, ProjectSteps>,
    upstreams: HashMap<ProjectId, Vec<ProjectId>>,
    aliases: HashMap<String, String>,
    sorted: OnceLock<Vec<StepId>>,
    duplicate_artifact_ids: OnceLock<HashSet<String>>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project and its direct upstream projects.
    pub fn add_project(&mut self, project: ProjectId, upstreams: Vec<ProjectId>) {
        if !self.steps.contains_key(&project) {
            self.projects.push(project.clone());
            self.steps.insert(project.clone(), ProjectSteps::default());
            self.duplicate_artifact_ids = OnceLock::new();
        }
        let known = self.upstreams.entry(project).or_default();
        for up in upstreams {
            if !known.contains(&up) {
                known.push(up);
            }
        }
    }

    /// Projects in insertion order.
    pub fn projects(&self) -> &[ProjectId] {
        &self.projects
    }

    pub fn upstreams(&self, project: &ProjectId) -> &[ProjectId] {
        self.upstreams.get(project).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Insert `step`, merging it into an existing step with the same key.
    pub fn add_step(&mut self, step: BuildStep) -> StepId {
        if let Some(existing) = self.step(&step.project, &step.name) {
            self.merge(existing, &step);
            return existing;
        }

        self.add_project(step.project.clone(), Vec::new());
        let project = step.project.clone();
        let name = step.name.clone();
        let id = self.graph.add_node(step);
        if let Some(entry) = self.steps.get_mut(&project) {
            entry.order.push(id);
            entry.by_name.insert(name, id);
        }
        self.invalidate();
        id
    }

    /// Union `other`'s executions into `into`.
    ///
    /// The merged step stays pruned only if both sides were pruned.
    fn merge(&mut self, into: StepId, other: &BuildStep) {
        let target = &mut self.graph[into];
        let pruned = target.is_pruned() && other.is_pruned();
        target.set_pruned(false);
        for (priority, execution) in other.executions_with_priority() {
            target.add_execution(execution.clone(), priority);
        }
        target.set_pruned(pruned);
        if target.phase.is_none() {
            target.phase = other.phase.clone();
        }
    }

    pub fn step(&self, project: &ProjectId, name: &str) -> Option<StepId> {
        self.steps.get(project)?.by_name.get(name).copied()
    }

    pub fn required_step(&self, project: &ProjectId, name: &str) -> Result<StepId> {
        self.step(project, name).ok_or_else(|| WeaveError::StepNotFound {
            project: project.to_string(),
            step: name.to_string(),
        })
    }

    pub fn node(&self, id: StepId) -> &BuildStep {
        &self.graph[id]
    }

    pub fn node_mut(&mut self, id: StepId) -> &mut BuildStep {
        &mut self.graph[id]
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Steps of `project`, in insertion order.
    pub fn steps(&self, project: &ProjectId) -> impl Iterator<Item = StepId> + '_ {
        self.steps
            .get(project)
            .into_iter()
            .flat_map(|s| s.order.iter().copied())
    }

    /// Every step, grouped by project in insertion order.
    pub fn all_steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.projects.iter().flat_map(|p| self.steps(p))
    }

    /// Make `step` wait for `predecessor`. Self-edges are ignored.
    pub fn execute_after(&mut self, step: StepId, predecessor: StepId) {
        if step == predecessor {
            return;
        }
        if self.graph.find_edge(predecessor, step).is_none() {
            self.graph.add_edge(predecessor, step, ());
            self.invalidate();
        }
    }

    pub fn predecessors(&self, id: StepId) -> impl Iterator<Item = StepId> + '_ {
        self.graph.neighbors_directed(id, Direction::Incoming)
    }

    pub fn successors(&self, id: StepId) -> impl Iterator<Item = StepId> + '_ {
        self.graph.neighbors_directed(id, Direction::Outgoing)
    }

    /// Every step `id` transitively waits on.
    pub fn all_predecessors(&self, id: StepId) -> HashSet<StepId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<StepId> = self.predecessors(id).collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.predecessors(next));
            }
        }
        seen
    }

    fn has_same_project_successor(&self, id: StepId) -> bool {
        let project = &self.graph[id].project;
        self.successors(id)
            .any(|s| &self.graph[s].project == project)
    }

    /// Steps of `project` with no successor in the same project.
    pub fn last_steps(&self, project: &ProjectId) -> Vec<StepId> {
        self.steps(project)
            .filter(|id| !self.has_same_project_successor(*id))
            .collect()
    }

    /// Steps of `project` with no predecessor at all.
    pub fn first_steps(&self, project: &ProjectId) -> Vec<StepId> {
        self.steps(project)
            .filter(|id| self.predecessors(*id).next().is_none())
            .collect()
    }

    /// Legacy phase name -> canonical phase name.
    pub fn aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }

    pub fn add_alias(&mut self, legacy: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.entry(legacy.into()).or_insert_with(|| canonical.into());
    }

    /// Steps in topological order: DFS post-order over successors from every
    /// node, reversed. Cached until the next structural change.
    pub fn sorted_nodes(&self) -> &[StepId] {
        self.sorted.get_or_init(|| {
            let mut dfs = DfsPostOrder::empty(&self.graph);
            let mut finished = Vec::with_capacity(self.graph.node_count());
            for start in self.all_steps() {
                if dfs.discovered.contains(start.index()) {
                    continue;
                }
                dfs.move_to(start);
                while let Some(node) = dfs.next(&self.graph) {
                    finished.push(node);
                }
            }
            finished.reverse();
            finished
        })
    }

    /// Artifact ids shared by more than one project of the plan.
    ///
    /// Such projects are logged with their full coordinates.
    pub fn duplicate_artifact_ids(&self) -> &HashSet<String> {
        self.duplicate_artifact_ids.get_or_init(|| {
            let mut seen = HashSet::new();
            let mut duplicates = HashSet::new();
            for project in &self.projects {
                let artifact = project.artifact_id().to_string();
                if !seen.insert(artifact.clone()) {
                    duplicates.insert(artifact);
                }
            }
            duplicates
        })
    }

    /// Display name for `project`: the artifact id unless it is ambiguous.
    pub fn project_name(&self, project: &ProjectId) -> String {
        let artifact = project.artifact_id();
        if self.duplicate_artifact_ids().contains(artifact) {
            project.to_string()
        } else {
            artifact.to_string()
        }
    }

    fn invalidate(&mut self) {
        self.sorted = OnceLock::new();
    }

    /// Move every step and edge of `other` into `self`, merging same-keyed
    /// steps. Returns the new id of every step of `other`.
    fn absorb(&mut self, other: BuildPlan) -> HashMap<StepId, StepId> {
        let BuildPlan {
            graph,
            projects,
            upstreams,
            aliases,
            ..
        } = other;

        for project in projects {
            let ups = upstreams.get(&project).cloned().unwrap_or_default();
            self.add_project(project, ups);
        }
        for (legacy, canonical) in aliases {
            self.add_alias(legacy, canonical);
        }

        let mut mapping = HashMap::with_capacity(graph.node_count());
        for old in graph.node_indices() {
            let new = self.add_step(graph[old].clone());
            mapping.insert(old, new);
        }
        for edge in graph.raw_edges() {
            self.execute_after(mapping[&edge.target()], mapping[&edge.source()]);
        }
        mapping
    }

    /// Sequential composition: `other` runs after `self`, project by project.
    ///
    /// For every project of `other`, the last steps of `self` for that project
    /// gain an edge to each first step of `other` whose name `self` does not
    /// already have. Same-named steps are merged rather than duplicated.
    pub fn then(&mut self, other: BuildPlan) {
        let mut links = Vec::new();
        for project in other.projects() {
            let lasts = self.last_steps(project);
            let firsts: Vec<StepId> = other
                .first_steps(project)
                .into_iter()
                .filter(|id| self.step(project, &other.node(*id).name).is_none())
                .collect();
            links.push((lasts, firsts));
        }

        let mapping = self.absorb(other);
        for (lasts, firsts) in links {
            for first in firsts {
                for last in &lasts {
                    self.execute_after(mapping[&first], *last);
                }
            }
        }
    }

    /// Splice `sub` in so that it runs right before `target`.
    ///
    /// The first steps of `sub` wait on the same-project predecessors of
    /// `target`, and `target` waits on the last steps of `sub`.
    pub fn splice_before(&mut self, target: StepId, sub: BuildPlan) {
        let project = self.graph[target].project.clone();
        let preds: Vec<StepId> = self
            .predecessors(target)
            .filter(|p| self.graph[*p].project == project)
            .collect();

        let firsts: Vec<StepId> = sub
            .all_steps()
            .filter(|id| sub.predecessors(*id).next().is_none())
            .collect();
        let lasts: Vec<StepId> = sub
            .all_steps()
            .filter(|id| sub.successors(*id).next().is_none())
            .collect();

        let mapping = self.absorb(sub);
        for first in firsts {
            for pred in &preds {
                self.execute_after(mapping[&first], *pred);
            }
        }
        for last in lasts {
            self.execute_after(target, mapping[&last]);
        }
    }

    /// Same plan with `prefix` prepended to every step name.
    pub fn prefixed(self, prefix: &str) -> BuildPlan {
        let mut out = BuildPlan::new();
        for project in &self.projects {
            out.add_project(project.clone(), self.upstreams(project).to_vec());
        }
        for (legacy, canonical) in &self.aliases {
            out.add_alias(legacy.clone(), canonical.clone());
        }

        let mut mapping = HashMap::with_capacity(self.graph.node_count());
        for old in self.all_steps() {
            let step = &self.graph[old];
            let renamed = step.renamed(format!("{prefix}{}", step.name));
            mapping.insert(old, out.add_step(renamed));
        }
        for edge in self.graph.raw_edges() {
            out.execute_after(mapping[&edge.target()], mapping[&edge.source()]);
        }
        out
    }
}
