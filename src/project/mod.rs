// src/project/mod.rs

//! Reactor projects and the plugins they declare.
//!
//! A [`Project`] is identified by its `group:artifact:version` coordinates.
//! Inter-project ordering comes from [`graph::ProjectDependencyGraph`].

pub mod graph;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use graph::{DefaultProjectDependencyGraph, ProjectDependencyGraph};

/// Free-form `name -> value` plugin configuration.
pub type Configuration = BTreeMap<String, String>;

/// Cheap-to-clone project identity, rendered as `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(Arc<str>);

impl ProjectId {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self(Arc::from(format!("{group_id}:{artifact_id}:{version}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn artifact_id(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or(&self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One `[[execution]]` of a plugin inside a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginExecution {
    pub id: String,
    /// Phase override; falls back to the goal's default phase.
    pub phase: Option<String>,
    pub goals: Vec<String>,
    /// Lower values run first inside a step.
    pub priority: i32,
    pub configuration: Configuration,
}

impl PluginExecution {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase: None,
            goals: Vec::new(),
            priority: 0,
            configuration: Configuration::new(),
        }
    }
}

/// A build plugin declared by a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    /// Bound implicitly by the lifecycle rather than declared by the user.
    pub default_binding: bool,
    pub configuration: Configuration,
    pub executions: Vec<PluginExecution>,
}

impl Plugin {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: None,
            default_binding: false,
            configuration: Configuration::new(),
            executions: Vec::new(),
        }
    }

    /// `group:artifact`, the key used to look plugins up.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn id(&self) -> String {
        match &self.version {
            Some(v) => format!("{}:{v}", self.key()),
            None => self.key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub basedir: PathBuf,
    pub plugins: Vec<Plugin>,
    /// Reactor projects this one depends on, in every scope.
    pub dependencies: Vec<ProjectId>,
    /// Projects aggregated by this one.
    pub modules: Vec<ProjectId>,
}

impl Project {
    pub fn new(group_id: &str, artifact_id: &str, version: &str) -> Self {
        Self {
            id: ProjectId::new(group_id, artifact_id, version),
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            basedir: PathBuf::from("."),
            plugins: Vec::new(),
            dependencies: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn plugin(&self, key: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.key() == key)
    }

    /// Whether this project is the artifact that provides `plugin`.
    pub fn provides(&self, plugin: &Plugin) -> bool {
        self.group_id == plugin.group_id && self.artifact_id == plugin.artifact_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_id_renders_coordinates() {
        let id = ProjectId::new("org.example", "core", "1.0");
        assert_eq!(id.as_str(), "org.example:core:1.0");
        assert_eq!(id.artifact_id(), "core");
        assert_eq!(id.to_string(), "org.example:core:1.0");
    }

    #[test]
    fn plugin_keys_ignore_versions() {
        let mut plugin = Plugin::new("org.example.plugins", "compiler");
        assert_eq!(plugin.key(), "org.example.plugins:compiler");
        assert_eq!(plugin.id(), "org.example.plugins:compiler");
        plugin.version = Some("3.1".to_string());
        assert_eq!(plugin.id(), "org.example.plugins:compiler:3.1");

        let mut project = Project::new("org.example", "app", "1.0");
        project.plugins.push(plugin.clone());
        assert!(project.plugin("org.example.plugins:compiler").is_some());
        assert!(!project.provides(&plugin));
        assert!(Project::new("org.example.plugins", "compiler", "3.1").provides(&plugin));
    }
}
