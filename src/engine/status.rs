// src/engine/status.rs

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::project::{ProjectDependencyGraph, ProjectId};

/// Reactor-wide failure state consulted by every scheduling decision.
///
/// Both fields only ever grow: once halted the reactor stays halted, and a
/// blacklisted project is never removed.
pub struct ReactorBuildStatus {
    graph: Arc<dyn ProjectDependencyGraph>,
    halted: AtomicBool,
    blacklist: Mutex<HashSet<ProjectId>>,
}

impl std::fmt::Debug for ReactorBuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorBuildStatus")
            .field("halted", &self.is_halted())
            .finish_non_exhaustive()
    }
}

impl ReactorBuildStatus {
    pub fn new(graph: Arc<dyn ProjectDependencyGraph>) -> Self {
        Self {
            graph,
            halted: AtomicBool::new(false),
            blacklist: Mutex::new(HashSet::new()),
        }
    }

    /// Stop scheduling ordinary work anywhere in the reactor.
    pub fn halt(&self) {
        if !self.halted.swap(true, Ordering::AcqRel) {
            warn!("reactor halted; no further ordinary steps will be scheduled");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Exclude `project` and everything transitively downstream of it.
    pub fn black_list(&self, project: &ProjectId) {
        let downstream = self.graph.downstream_projects(project, true);
        let mut blacklist = self.blacklist.lock().unwrap_or_else(PoisonError::into_inner);
        if blacklist.insert(project.clone()) {
            info!(project = %project, downstream = downstream.len(), "project blacklisted");
        }
        blacklist.extend(downstream);
    }

    pub fn is_blacklisted(&self, project: &ProjectId) -> bool {
        self.blacklist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(project)
    }

    pub fn is_blacklisted_any(&self) -> bool {
        !self
            .blacklist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{DefaultProjectDependencyGraph, Project};

    #[test]
    fn blacklist_covers_transitive_downstream_only() {
        let a = Project::new("org.example", "a", "1.0");
        let mut b = Project::new("org.example", "b", "1.0");
        b.dependencies.push(a.id.clone());
        let mut c = Project::new("org.example", "c", "1.0");
        c.dependencies.push(b.id.clone());
        let d = Project::new("org.example", "d", "1.0");

        let graph = DefaultProjectDependencyGraph::new(&[a.clone(), b.clone(), c.clone(), d.clone()])
            .unwrap();
        let status = ReactorBuildStatus::new(Arc::new(graph));

        assert!(!status.is_blacklisted_any());
        status.black_list(&a.id);
        assert!(status.is_blacklisted(&a.id));
        assert!(status.is_blacklisted(&b.id));
        assert!(status.is_blacklisted(&c.id));
        assert!(!status.is_blacklisted(&d.id));
        assert!(!status.is_halted());
    }

    #[test]
    fn halt_is_sticky() {
        let graph = DefaultProjectDependencyGraph::new(&[]).unwrap();
        let status = ReactorBuildStatus::new(Arc::new(graph));
        status.halt();
        status.halt();
        assert!(status.is_halted());
    }
}
