// src/plan/mod.rs

//! Build plan: the DAG of build steps walked by the scheduler.
//!
//! - [`step`] defines [`BuildStep`] and its atomic status.
//! - [`build_plan`] defines [`BuildPlan`], the petgraph-backed container with
//!   sequential composition (`then`), fork splicing and a cached
//!   topological order.

pub mod build_plan;
pub mod step;

pub use build_plan::{BuildPlan, StepId};
pub use step::{BuildStep, StepKind, StepState, StepStatus};

/// Marker step that binds plugin executions and expands forks.
pub const PLAN: &str = "$plan$";
/// First step of every project.
pub const SETUP: &str = "$setup$";
/// Last step of every project; reports the project's outcome.
pub const TEARDOWN: &str = "$teardown$";

/// Prefix given to every step of a sub-plan forked by `execution_id`.
pub fn fork_prefix(execution_id: &str) -> String {
    format!("fork({execution_id}):")
}

/// Step name with every `fork(...):` prefix removed.
pub fn base_name(name: &str) -> &str {
    let mut rest = name;
    while let Some(stripped) = rest.strip_prefix("fork(") {
        match stripped.find("):") {
            Some(end) => rest = &stripped[end + 2..],
            None => break,
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_nested_fork_prefixes() {
        assert_eq!(base_name("compile"), "compile");
        assert_eq!(base_name("fork(gen):sources"), "sources");
        assert_eq!(base_name("fork(outer):fork(inner):after:sources"), "after:sources");
        assert_eq!(fork_prefix("gen"), "fork(gen):");
    }
}
