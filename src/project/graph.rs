// src/project/graph.rs

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed, Walker};

use crate::errors::{Result, WeaveError};
use crate::project::{Project, ProjectId};

/// Ordering relation between reactor projects.
pub trait ProjectDependencyGraph: Send + Sync {
    /// Every project, upstream projects first.
    fn sorted_projects(&self) -> Vec<ProjectId>;

    /// Projects `project` depends on, in sorted order.
    fn upstream_projects(&self, project: &ProjectId, transitive: bool) -> Vec<ProjectId>;

    /// Projects depending on `project`, in sorted order.
    fn downstream_projects(&self, project: &ProjectId, transitive: bool) -> Vec<ProjectId>;
}

/// Dependency graph backed by a petgraph `DiGraph`.
///
/// Edge direction is upstream -> downstream.
#[derive(Debug, Clone)]
pub struct DefaultProjectDependencyGraph {
    graph: DiGraph<ProjectId, ()>,
    index: HashMap<ProjectId, NodeIndex>,
    sorted: Vec<ProjectId>,
}

impl DefaultProjectDependencyGraph {
    /// Build the graph from each project's declared dependencies, plus an
    /// edge from every reactor project that provides a plugin to the
    /// projects using that plugin.
    ///
    /// Fails on unknown dependencies, self-dependencies and cycles.
    pub fn new(projects: &[Project]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for project in projects {
            let node = graph.add_node(project.id.clone());
            index.insert(project.id.clone(), node);
        }

        for project in projects {
            let to = index[&project.id];
            for dep in &project.dependencies {
                if dep == &project.id {
                    return Err(WeaveError::ConfigError(format!(
                        "project '{}' cannot depend on itself",
                        project.id
                    )));
                }
                let from = *index
                    .get(dep)
                    .ok_or_else(|| WeaveError::ProjectNotFound(dep.to_string()))?;
                graph.update_edge(from, to, ());
            }
            for plugin in &project.plugins {
                for provider in projects {
                    if provider.id != project.id && provider.provides(plugin) {
                        graph.update_edge(index[&provider.id], to, ());
                    }
                }
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            WeaveError::DependencyCycle(format!(
                "cycle detected involving project '{}'",
                graph[cycle.node_id()]
            ))
        })?;

        let sorted = stable_order(&graph);

        Ok(Self {
            graph,
            index,
            sorted,
        })
    }

    fn collect(&self, project: &ProjectId, direction: Direction, transitive: bool) -> Vec<ProjectId> {
        let Some(&start) = self.index.get(project) else {
            return Vec::new();
        };

        let reached: Vec<NodeIndex> = if transitive {
            match direction {
                Direction::Outgoing => Dfs::new(&self.graph, start).iter(&self.graph).collect(),
                Direction::Incoming => {
                    let reversed = Reversed(&self.graph);
                    Dfs::new(reversed, start).iter(reversed).collect()
                }
            }
        } else {
            self.graph.neighbors_directed(start, direction).collect()
        };

        self.sorted
            .iter()
            .filter(|id| {
                let node = self.index[*id];
                node != start && reached.contains(&node)
            })
            .cloned()
            .collect()
    }
}

/// Kahn's algorithm picking the earliest declared ready project each time.
///
/// The graph must be acyclic.
fn stable_order(graph: &DiGraph<ProjectId, ()>) -> Vec<ProjectId> {
    let count = graph.node_count();
    let mut indegree: Vec<usize> = (0..count)
        .map(|i| {
            graph
                .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                .count()
        })
        .collect();
    let mut done = vec![false; count];
    let mut out = Vec::with_capacity(count);

    while out.len() < count {
        let Some(next) = (0..count).find(|&i| !done[i] && indegree[i] == 0) else {
            break;
        };
        done[next] = true;
        let node = NodeIndex::new(next);
        for succ in graph.neighbors_directed(node, Direction::Outgoing) {
            indegree[succ.index()] = indegree[succ.index()].saturating_sub(1);
        }
        out.push(graph[node].clone());
    }

    out
}

impl ProjectDependencyGraph for DefaultProjectDependencyGraph {
    fn sorted_projects(&self) -> Vec<ProjectId> {
        self.sorted.clone()
    }

    fn upstream_projects(&self, project: &ProjectId, transitive: bool) -> Vec<ProjectId> {
        self.collect(project, Direction::Incoming, transitive)
    }

    fn downstream_projects(&self, project: &ProjectId, transitive: bool) -> Vec<ProjectId> {
        self.collect(project, Direction::Outgoing, transitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Plugin;

    fn project(name: &str, deps: &[&Project]) -> Project {
        let mut p = Project::new("org.example", name, "1.0");
        p.dependencies = deps.iter().map(|d| d.id.clone()).collect();
        p
    }

    #[test]
    fn sorts_upstream_first_and_keeps_declaration_order() {
        let a = project("a", &[]);
        let b = project("b", &[&a]);
        let c = project("c", &[&b]);
        let d = project("d", &[]);
        // Declared out of order on purpose.
        let graph = DefaultProjectDependencyGraph::new(&[c.clone(), d.clone(), b.clone(), a.clone()])
            .unwrap();

        let sorted = graph.sorted_projects();
        assert_eq!(sorted, vec![d.id.clone(), a.id.clone(), b.id.clone(), c.id.clone()]);

        assert_eq!(graph.upstream_projects(&c.id, false), vec![b.id.clone()]);
        assert_eq!(graph.upstream_projects(&c.id, true), vec![a.id.clone(), b.id.clone()]);
        assert_eq!(graph.downstream_projects(&a.id, true), vec![b.id.clone(), c.id.clone()]);
        assert!(graph.downstream_projects(&d.id, true).is_empty());
    }

    #[test]
    fn rejects_cycles_and_unknown_dependencies() {
        let mut a = project("a", &[]);
        let b = project("b", &[&a]);
        a.dependencies.push(b.id.clone());
        let err = DefaultProjectDependencyGraph::new(&[a, b]).unwrap_err();
        assert!(matches!(err, WeaveError::DependencyCycle(_)));

        let ghost = project("ghost", &[]);
        let lonely = project("lonely", &[&ghost]);
        let err = DefaultProjectDependencyGraph::new(&[lonely]).unwrap_err();
        assert!(matches!(err, WeaveError::ProjectNotFound(_)));
    }

    #[test]
    fn plugin_providers_build_before_their_users() {
        let tools = project("tools", &[]);
        let mut app = project("app", &[]);
        app.plugins.push(Plugin::new("org.example", "tools"));

        let graph = DefaultProjectDependencyGraph::new(&[app.clone(), tools.clone()]).unwrap();
        assert_eq!(graph.sorted_projects(), vec![tools.id.clone(), app.id.clone()]);
        assert_eq!(graph.upstream_projects(&app.id, false), vec![tools.id.clone()]);
    }

    #[test]
    fn plugin_provider_depending_on_its_user_is_a_cycle() {
        let mut app = project("app", &[]);
        app.plugins.push(Plugin::new("org.example", "tools"));
        let tools = project("tools", &[&app]);

        let err = DefaultProjectDependencyGraph::new(&[app, tools]).unwrap_err();
        assert!(matches!(err, WeaveError::DependencyCycle(_)));
    }

    #[test]
    fn project_using_its_own_plugin_is_not_a_cycle() {
        let mut tools = project("tools", &[]);
        tools.plugins.push(Plugin::new("org.example", "tools"));
        assert!(DefaultProjectDependencyGraph::new(&[tools]).is_ok());
    }
}
