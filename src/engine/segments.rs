// src/engine/segments.rs

//! Splitting the requested goals into task segments.
//!
//! Consecutive tasks that share the same aggregation flag form one segment.
//! Aggregating segments run on the top-level project only.

use std::fmt;

use tracing::debug;

use crate::engine::Session;
use crate::errors::{Result, WeaveError};
use crate::lifecycle::{AFTER, AT, BEFORE};
use crate::plugin::{GoalSpec, MojoResolver};

/// One requested task: a lifecycle phase or a plugin goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Lifecycle(String),
    Goal(String),
}

impl Task {
    /// `prefix:goal` and `group:artifact[:version]:goal` are goals; anything
    /// without a colon, or marked `before:` / `after:` / `at:`, is a phase.
    pub fn parse(task: &str) -> Self {
        let is_phase = !task.contains(':')
            || task.starts_with(BEFORE)
            || task.starts_with(AFTER)
            || task.starts_with(AT);
        if is_phase {
            Task::Lifecycle(task.to_string())
        } else {
            Task::Goal(task.to_string())
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Task::Lifecycle(v) | Task::Goal(v) => v,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSegment {
    pub aggregating: bool,
    pub tasks: Vec<Task>,
}

impl TaskSegment {
    pub fn new(aggregating: bool, tasks: Vec<Task>) -> Self {
        Self { aggregating, tasks }
    }
}

pub fn calculate_task_segments(
    session: &Session,
    resolver: &dyn MojoResolver,
    goals: &[String],
) -> Result<Vec<TaskSegment>> {
    if goals.is_empty() {
        return Err(WeaveError::ConfigError(
            "no goals have been specified for this build; pass lifecycle phases or \
             plugin goals, or set `build.goals` in the config file"
                .to_string(),
        ));
    }

    let top_level = session.top_level_project();
    let top_level = session
        .project(top_level)
        .ok_or_else(|| WeaveError::ProjectNotFound(top_level.to_string()))?;

    let mut segments: Vec<TaskSegment> = Vec::new();
    for goal in goals {
        let task = Task::parse(goal);
        let aggregating = match &task {
            Task::Lifecycle(_) => false,
            Task::Goal(goal) => {
                let spec = GoalSpec::parse(goal)?;
                resolver.cli_mojo_descriptor(top_level, &spec)?.aggregator
            }
        };

        match segments.last_mut() {
            Some(segment) if segment.aggregating == aggregating => segment.tasks.push(task),
            _ => segments.push(TaskSegment::new(aggregating, vec![task])),
        }
    }

    debug!(goals = ?goals, segments = segments.len(), "calculated task segments");
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExecutionRequest;
    use crate::plugin::{InMemoryMojoResolver, MojoDescriptor, PluginDescriptor};
    use crate::project::Project;
    use std::sync::Arc;

    fn resolver() -> InMemoryMojoResolver {
        let mut report = MojoDescriptor::new("org.example.plugins:site", "report");
        report.aggregator = true;
        let stage = MojoDescriptor::new("org.example.plugins:site", "stage");
        InMemoryMojoResolver::new(vec![PluginDescriptor {
            group_id: "org.example.plugins".into(),
            artifact_id: "site".into(),
            mojos: vec![Arc::new(report), Arc::new(stage)],
            ..Default::default()
        }])
    }

    fn session() -> Session {
        Session::new(
            vec![Project::new("org.example", "root", "1.0")],
            ExecutionRequest::default(),
        )
        .unwrap()
    }

    #[test]
    fn tasks_are_classified_by_shape() {
        assert_eq!(Task::parse("install"), Task::Lifecycle("install".into()));
        assert_eq!(Task::parse("after:compile"), Task::Lifecycle("after:compile".into()));
        assert_eq!(Task::parse("at:test"), Task::Lifecycle("at:test".into()));
        assert_eq!(Task::parse("site:report"), Task::Goal("site:report".into()));
        assert_eq!(
            Task::parse("org.example:site:1.0:report@x"),
            Task::Goal("org.example:site:1.0:report@x".into())
        );
    }

    #[test]
    fn consecutive_tasks_group_by_aggregation() {
        let goals: Vec<String> = ["clean", "site:stage", "site:report", "install"]
            .into_iter()
            .map(String::from)
            .collect();
        let segments = calculate_task_segments(&session(), &resolver(), &goals).unwrap();

        assert_eq!(segments.len(), 3);
        assert!(!segments[0].aggregating);
        assert_eq!(segments[0].tasks.len(), 2);
        assert!(segments[1].aggregating);
        assert_eq!(segments[1].tasks, vec![Task::Goal("site:report".into())]);
        assert_eq!(segments[2].tasks, vec![Task::Lifecycle("install".into())]);
    }

    #[test]
    fn empty_goal_list_is_an_error() {
        let err = calculate_task_segments(&session(), &resolver(), &[]).unwrap_err();
        assert!(matches!(err, WeaveError::ConfigError(_)));
    }

    #[test]
    fn unknown_goal_prefix_is_an_error() {
        let goals = vec!["nope:run".to_string()];
        assert!(calculate_task_segments(&session(), &resolver(), &goals).is_err());
    }
}
