// src/plugin/mod.rs

//! Plugin and goal ("mojo") descriptors, goal specs and bound executions.
//!
//! Descriptors are produced by a [`resolver::MojoResolver`]; the planner
//! turns them into [`MojoExecution`]s bound to build steps.

pub mod resolver;

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::errors::{Result, WeaveError};
use crate::project::Configuration;
use crate::types::ExecutionSource;

pub use resolver::{InMemoryMojoResolver, MojoResolver};

/// Execution id used for goals requested on the command line.
pub const DEFAULT_CLI_EXECUTION_ID: &str = "default-cli";

/// A goal parameter declared by its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub alias: Option<String>,
    pub default_value: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            default_value: None,
        }
    }
}

/// Static description of one plugin goal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MojoDescriptor {
    pub goal: String,
    /// `group:artifact` of the owning plugin.
    pub plugin_key: String,
    pub plugin_version: Option<String>,
    /// Phase the goal binds to when an execution does not override it.
    pub phase: Option<String>,
    /// Goal of the same plugin to fork before this one runs.
    pub execute_goal: Option<String>,
    /// Lifecycle phase to fork before this one runs.
    pub execute_phase: Option<String>,
    /// Lifecycle (plugin overlay or registry id) used by the phase fork.
    pub execute_lifecycle: Option<String>,
    pub thread_safe: bool,
    pub aggregator: bool,
    pub dependency_resolution_required: bool,
    pub dependency_collection_required: bool,
    pub parameters: Vec<Parameter>,
    /// Name of the configurator; `None` selects the default one.
    pub configurator: Option<String>,
    /// Shell command run by the shell executor.
    pub command: Option<String>,
}

impl MojoDescriptor {
    pub fn new(plugin_key: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            plugin_key: plugin_key.into(),
            thread_safe: true,
            ..Default::default()
        }
    }

    /// `group:artifact[:version]:goal`.
    pub fn id(&self) -> String {
        match &self.plugin_version {
            Some(v) => format!("{}:{v}:{}", self.plugin_key, self.goal),
            None => format!("{}:{}", self.plugin_key, self.goal),
        }
    }

    pub fn requires_dependencies(&self) -> bool {
        self.dependency_resolution_required || self.dependency_collection_required
    }

    pub fn forks(&self) -> bool {
        self.execute_goal.as_deref().is_some_and(|g| !g.is_empty())
            || self.execute_phase.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Everything known about one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginDescriptor {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub goal_prefix: Option<String>,
    pub mojos: Vec<Arc<MojoDescriptor>>,
    /// Lifecycle overlays usable by phase forks of this plugin's goals.
    pub lifecycles: Vec<LifecycleOverlay>,
}

impl PluginDescriptor {
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn mojo(&self, goal: &str) -> Option<&Arc<MojoDescriptor>> {
        self.mojos.iter().find(|m| m.goal == goal)
    }

    pub fn lifecycle_overlay(&self, id: &str) -> Option<&LifecycleOverlay> {
        self.lifecycles.iter().find(|l| l.id == id)
    }
}

/// Extra goals a plugin binds onto the phases of a forked lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOverlay {
    pub id: String,
    /// `(phase, goals)` pairs, in declaration order.
    pub phases: Vec<(String, Vec<String>)>,
}

/// A goal bound to a build step, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MojoExecution {
    pub descriptor: Arc<MojoDescriptor>,
    pub execution_id: String,
    /// Phase as written by the user, before alias resolution.
    pub lifecycle_phase: Option<String>,
    pub source: ExecutionSource,
    /// Raw configuration; finalized by a configurator before execution.
    pub configuration: Configuration,
}

impl MojoExecution {
    pub fn new(descriptor: Arc<MojoDescriptor>, execution_id: impl Into<String>) -> Self {
        Self {
            descriptor,
            execution_id: execution_id.into(),
            lifecycle_phase: None,
            source: ExecutionSource::Lifecycle,
            configuration: Configuration::new(),
        }
    }

    pub fn goal(&self) -> &str {
        &self.descriptor.goal
    }
}

impl fmt::Display for MojoExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.descriptor.id(), self.execution_id)
    }
}

/// A goal requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalSpec {
    /// `prefix:goal[@id]`
    Prefixed {
        prefix: String,
        goal: String,
        execution_id: Option<String>,
    },
    /// `group:artifact[:version]:goal[@id]`
    Qualified {
        group_id: String,
        artifact_id: String,
        version: Option<String>,
        goal: String,
        execution_id: Option<String>,
    },
}

static GOAL_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<prefix>[^:@]+)|(?P<group>[^:@]+):(?P<artifact>[^:@]+)(?::(?P<version>[^:@]+))?):(?P<goal>[^:@]+)(?:@(?P<exec>[^:@]+))?$",
    )
    .expect("goal spec regex is valid")
});

impl GoalSpec {
    pub fn parse(task: &str) -> Result<Self> {
        let caps = GOAL_SPEC.captures(task.trim()).ok_or_else(|| {
            WeaveError::ConfigError(format!(
                "invalid goal '{task}': expected <prefix>:<goal> or <group>:<artifact>[:<version>]:<goal>"
            ))
        })?;
        let get = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        let goal = get("goal").unwrap_or_default();
        let execution_id = get("exec");

        match get("prefix") {
            Some(prefix) => Ok(GoalSpec::Prefixed {
                prefix,
                goal,
                execution_id,
            }),
            None => Ok(GoalSpec::Qualified {
                group_id: get("group").unwrap_or_default(),
                artifact_id: get("artifact").unwrap_or_default(),
                version: get("version"),
                goal,
                execution_id,
            }),
        }
    }

    pub fn goal(&self) -> &str {
        match self {
            GoalSpec::Prefixed { goal, .. } | GoalSpec::Qualified { goal, .. } => goal,
        }
    }

    /// Execution id after `@`, or `default-cli`.
    pub fn execution_id(&self) -> &str {
        match self {
            GoalSpec::Prefixed { execution_id, .. } | GoalSpec::Qualified { execution_id, .. } => {
                execution_id.as_deref().unwrap_or(DEFAULT_CLI_EXECUTION_ID)
            }
        }
    }
}

impl fmt::Display for GoalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalSpec::Prefixed { prefix, goal, .. } => write!(f, "{prefix}:{goal}")?,
            GoalSpec::Qualified {
                group_id,
                artifact_id,
                version,
                goal,
                ..
            } => {
                write!(f, "{group_id}:{artifact_id}")?;
                if let Some(v) = version {
                    write!(f, ":{v}")?;
                }
                write!(f, ":{goal}")?;
            }
        }
        match self {
            GoalSpec::Prefixed {
                execution_id: Some(id),
                ..
            }
            | GoalSpec::Qualified {
                execution_id: Some(id),
                ..
            } => write!(f, "@{id}"),
            _ => Ok(()),
        }
    }
}
