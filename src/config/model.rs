// src/config/model.rs

//! Data model for `Weave.toml`.
//!
//! ```toml
//! [build]
//! group = "org.example"
//! threads = 4
//! failure_behaviour = "fail-at-end"
//! goals = ["install"]
//!
//! [project.api]
//! dir = "api"
//!
//! [project.app]
//! depends_on = ["api"]
//!
//! [[project.app.plugin]]
//! id = "org.example.plugins:compiler"
//! version = "1.0"
//!
//! [[project.app.plugin.execution]]
//! id = "default-compile"
//! goals = ["compile"]
//!
//! [plugin."org.example.plugins:compiler"]
//! prefix = "compiler"
//!
//! [plugin."org.example.plugins:compiler".mojo.compile]
//! phase = "compile"
//! cmd = "cargo build"
//! ```
//!
//! Projects are keyed by artifact id. The group id defaults to
//! `[build].group` and the version to `[build].version`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::project::Configuration;
use crate::types::FailureBehaviour;

fn default_group() -> String {
    "local".to_string()
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// `[build]`: reactor-wide defaults, all overridable on the command line.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Requested degree of concurrency.
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub failure_behaviour: FailureBehaviour,

    /// Goals used when none are given on the command line.
    #[serde(default)]
    pub goals: Vec<String>,

    /// Artifact id of the top-level project. Defaults to the first project
    /// that no other project lists as a module.
    #[serde(default)]
    pub root: Option<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            group: default_group(),
            version: default_version(),
            threads: None,
            failure_behaviour: FailureBehaviour::default(),
            goals: Vec::new(),
            root: None,
        }
    }
}

/// `[project.<artifact>]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    /// Base directory, relative to the config file. Defaults to the
    /// config file's directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Artifact ids of upstream projects.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Artifact ids of aggregated projects.
    #[serde(default)]
    pub modules: Vec<String>,

    #[serde(default)]
    pub plugin: Vec<PluginUsage>,
}

/// `[[project.<artifact>.plugin]]`: a plugin used by a project.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginUsage {
    /// `group:artifact`
    pub id: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Bound by the lifecycle's default mapping rather than declared by the
    /// user.
    #[serde(default)]
    pub default_binding: bool,

    #[serde(default)]
    pub configuration: Configuration,

    #[serde(default)]
    pub execution: Vec<ExecutionSection>,
}

/// `[[project.<artifact>.plugin.execution]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionSection {
    pub id: String,

    pub goals: Vec<String>,

    /// Overrides the goal's default phase.
    #[serde(default)]
    pub phase: Option<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub configuration: Configuration,
}

/// `[plugin."<group>:<artifact>"]`: a plugin descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSection {
    #[serde(default)]
    pub version: Option<String>,

    /// Goal prefix used on the command line (`prefix:goal`).
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub mojo: BTreeMap<String, MojoSection>,

    /// Lifecycle overlays usable by phase forks, keyed by id.
    #[serde(default)]
    pub lifecycle: BTreeMap<String, OverlaySection>,
}

/// `[plugin."<key>".mojo.<goal>]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MojoSection {
    #[serde(default)]
    pub phase: Option<String>,

    /// Shell command run when the goal executes.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default = "default_true")]
    pub thread_safe: bool,

    #[serde(default)]
    pub aggregator: bool,

    #[serde(default)]
    pub requires_dependency_resolution: bool,

    #[serde(default)]
    pub requires_dependency_collection: bool,

    /// Goal of the same plugin to run first, in a forked execution.
    #[serde(default)]
    pub fork_goal: Option<String>,

    /// Lifecycle phase to run first, in a forked execution.
    #[serde(default)]
    pub fork_phase: Option<String>,

    /// Overlay id or lifecycle id used by `fork_phase`.
    #[serde(default)]
    pub fork_lifecycle: Option<String>,

    #[serde(default)]
    pub configurator: Option<String>,

    #[serde(default)]
    pub parameters: Vec<ParameterSection>,
}

impl Default for MojoSection {
    fn default() -> Self {
        Self {
            phase: None,
            cmd: None,
            thread_safe: true,
            aggregator: false,
            requires_dependency_resolution: false,
            requires_dependency_collection: false,
            fork_goal: None,
            fork_phase: None,
            fork_lifecycle: None,
            configurator: None,
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSection {
    pub name: String,

    #[serde(default)]
    pub alias: Option<String>,

    #[serde(default)]
    pub default: Option<String>,
}

/// `[plugin."<key>".lifecycle.<id>]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlaySection {
    #[serde(default)]
    pub phases: Vec<OverlayPhase>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayPhase {
    pub name: String,
    #[serde(default)]
    pub goals: Vec<String>,
}

/// `[lifecycle.<id>]`: an extra lifecycle whose phases run in order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleSection {
    pub phases: Vec<String>,
}

/// Unvalidated file contents, straight from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub project: BTreeMap<String, ProjectSection>,

    #[serde(default)]
    pub plugin: BTreeMap<String, PluginSection>,

    #[serde(default)]
    pub lifecycle: BTreeMap<String, LifecycleSection>,
}

/// A validated configuration. Build one with `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub build: BuildSection,
    pub project: BTreeMap<String, ProjectSection>,
    pub plugin: BTreeMap<String, PluginSection>,
    pub lifecycle: BTreeMap<String, LifecycleSection>,
}

impl ConfigFile {
    /// Wrap sections without validating them.
    pub fn new_unchecked(
        build: BuildSection,
        project: BTreeMap<String, ProjectSection>,
        plugin: BTreeMap<String, PluginSection>,
        lifecycle: BTreeMap<String, LifecycleSection>,
    ) -> Self {
        Self {
            build,
            project,
            plugin,
            lifecycle,
        }
    }
}

/// Split a `group:artifact` plugin key.
pub fn split_plugin_key(key: &str) -> Option<(&str, &str)> {
    let (group, artifact) = key.split_once(':')?;
    if group.is_empty() || artifact.is_empty() || artifact.contains(':') {
        return None;
    }
    Some((group, artifact))
}
