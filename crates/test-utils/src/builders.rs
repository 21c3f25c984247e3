#![allow(dead_code)]

use std::sync::Arc;

use weave::engine::{ExecutionRequest, Session};
use weave::lifecycle::DefaultLifecycleRegistry;
use weave::plugin::{
    InMemoryMojoResolver, LifecycleOverlay, MojoDescriptor, Parameter, PluginDescriptor,
};
use weave::project::{Plugin, PluginExecution, Project, ProjectId};
use weave::types::FailureBehaviour;

pub const GROUP: &str = "org.example";
pub const VERSION: &str = "1.0";

/// Key of the plugin registered by [`ReactorBuilder::with_std_plugin`].
pub const STD_PLUGIN: &str = "org.example.plugins:std";

/// Goals of the std plugin and the phases they bind to.
pub const STD_GOALS: &[(&str, &str)] = &[
    ("clean", "clean"),
    ("generate", "sources"),
    ("compile", "compile"),
    ("package", "package"),
    ("install", "install"),
];

pub fn project_id(artifact: &str) -> ProjectId {
    ProjectId::new(GROUP, artifact, VERSION)
}

/// Builder for `MojoDescriptor`.
pub struct MojoBuilder {
    mojo: MojoDescriptor,
}

impl MojoBuilder {
    pub fn new(goal: &str) -> Self {
        Self {
            mojo: MojoDescriptor::new("", goal),
        }
    }

    pub fn phase(mut self, phase: &str) -> Self {
        self.mojo.phase = Some(phase.to_string());
        self
    }

    pub fn thread_unsafe(mut self) -> Self {
        self.mojo.thread_safe = false;
        self
    }

    pub fn aggregator(mut self) -> Self {
        self.mojo.aggregator = true;
        self
    }

    pub fn requires_dependencies(mut self) -> Self {
        self.mojo.dependency_resolution_required = true;
        self
    }

    pub fn fork_goal(mut self, goal: &str) -> Self {
        self.mojo.execute_goal = Some(goal.to_string());
        self
    }

    pub fn fork_phase(mut self, phase: &str) -> Self {
        self.mojo.execute_phase = Some(phase.to_string());
        self
    }

    pub fn fork_lifecycle(mut self, id: &str) -> Self {
        self.mojo.execute_lifecycle = Some(id.to_string());
        self
    }

    pub fn parameter(mut self, name: &str, default: Option<&str>) -> Self {
        let mut parameter = Parameter::new(name);
        parameter.default_value = default.map(str::to_string);
        self.mojo.parameters.push(parameter);
        self
    }

    pub fn build(mut self, plugin_key: &str) -> MojoDescriptor {
        self.mojo.plugin_key = plugin_key.to_string();
        self.mojo
    }
}

/// Builder for `PluginDescriptor`.
pub struct PluginBuilder {
    key: String,
    prefix: Option<String>,
    mojos: Vec<MojoBuilder>,
    overlays: Vec<LifecycleOverlay>,
}

impl PluginBuilder {
    /// `key` is `group:artifact`.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            prefix: None,
            mojos: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn mojo(mut self, mojo: MojoBuilder) -> Self {
        self.mojos.push(mojo);
        self
    }

    pub fn overlay(mut self, id: &str, phases: &[(&str, &[&str])]) -> Self {
        self.overlays.push(LifecycleOverlay {
            id: id.to_string(),
            phases: phases
                .iter()
                .map(|(phase, goals)| {
                    (
                        phase.to_string(),
                        goals.iter().map(|g| g.to_string()).collect(),
                    )
                })
                .collect(),
        });
        self
    }

    pub fn build(self) -> PluginDescriptor {
        let (group_id, artifact_id) = self
            .key
            .split_once(':')
            .expect("plugin key must be <group>:<artifact>");
        PluginDescriptor {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: None,
            goal_prefix: self.prefix,
            mojos: self
                .mojos
                .into_iter()
                .map(|m| Arc::new(m.build(&self.key)))
                .collect(),
            lifecycles: self.overlays,
        }
    }
}

/// Builder for `Project`; projects are named by artifact id.
pub struct ProjectBuilder {
    artifact: String,
    depends_on: Vec<String>,
    modules: Vec<String>,
    plugins: Vec<Plugin>,
}

impl ProjectBuilder {
    pub fn new(artifact: &str) -> Self {
        Self {
            artifact: artifact.to_string(),
            depends_on: Vec::new(),
            modules: Vec::new(),
            plugins: Vec::new(),
        }
    }

    pub fn depends_on(mut self, artifact: &str) -> Self {
        self.depends_on.push(artifact.to_string());
        self
    }

    pub fn module(mut self, artifact: &str) -> Self {
        self.modules.push(artifact.to_string());
        self
    }

    /// Bind every std plugin goal to its default phase.
    pub fn std_goals(self) -> Self {
        let goals: Vec<&str> = STD_GOALS.iter().map(|(goal, _)| *goal).collect();
        self.execution(STD_PLUGIN, "default", &goals)
    }

    /// Declare an execution of `goals` from plugin `key`.
    pub fn execution(self, key: &str, id: &str, goals: &[&str]) -> Self {
        self.execution_with(key, id, goals, None, 0)
    }

    pub fn execution_with(
        mut self,
        key: &str,
        id: &str,
        goals: &[&str],
        phase: Option<&str>,
        priority: i32,
    ) -> Self {
        let index = match self.plugins.iter().position(|p| p.key() == key) {
            Some(index) => index,
            None => {
                let (group, artifact) = key
                    .split_once(':')
                    .expect("plugin key must be <group>:<artifact>");
                self.plugins.push(Plugin::new(group, artifact));
                self.plugins.len() - 1
            }
        };
        let mut execution = PluginExecution::new(id);
        execution.goals = goals.iter().map(|g| g.to_string()).collect();
        execution.phase = phase.map(str::to_string);
        execution.priority = priority;
        self.plugins[index].executions.push(execution);
        self
    }

    pub fn build(self) -> Project {
        let mut project = Project::new(GROUP, &self.artifact, VERSION);
        project.dependencies = self.depends_on.iter().map(|a| project_id(a)).collect();
        project.modules = self.modules.iter().map(|a| project_id(a)).collect();
        project.plugins = self.plugins;
        project
    }
}

/// A reactor ready to build: session, goal descriptors and lifecycles.
pub struct Reactor {
    pub session: Arc<Session>,
    pub resolver: Arc<InMemoryMojoResolver>,
    pub lifecycles: Arc<DefaultLifecycleRegistry>,
}

/// Builder for a whole reactor.
pub struct ReactorBuilder {
    projects: Vec<ProjectBuilder>,
    plugins: Vec<PluginBuilder>,
    request: ExecutionRequest,
    top_level: Option<String>,
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self {
            projects: Vec::new(),
            plugins: Vec::new(),
            request: ExecutionRequest::default(),
            top_level: None,
        }
    }

    pub fn project(mut self, project: ProjectBuilder) -> Self {
        self.projects.push(project);
        self
    }

    pub fn plugin(mut self, plugin: PluginBuilder) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Register the `std` plugin with one goal per entry of [`STD_GOALS`].
    pub fn with_std_plugin(self) -> Self {
        self.plugin(std_plugin())
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.request.degree_of_concurrency = threads;
        self
    }

    pub fn failure_behaviour(mut self, behaviour: FailureBehaviour) -> Self {
        self.request.failure_behaviour = behaviour;
        self
    }

    pub fn top_level(mut self, artifact: &str) -> Self {
        self.top_level = Some(artifact.to_string());
        self
    }

    pub fn build(self) -> Reactor {
        let projects = self.projects.into_iter().map(ProjectBuilder::build).collect();
        let mut session =
            Session::new(projects, self.request).expect("Failed to build session from builder");
        if let Some(top) = self.top_level {
            session = session
                .with_top_level(&project_id(&top))
                .expect("top-level project must be part of the reactor");
        }

        Reactor {
            session: Arc::new(session),
            resolver: Arc::new(InMemoryMojoResolver::new(
                self.plugins.into_iter().map(PluginBuilder::build).collect(),
            )),
            lifecycles: Arc::new(DefaultLifecycleRegistry::new()),
        }
    }
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The `std` plugin without any extra goals.
pub fn std_plugin() -> PluginBuilder {
    STD_GOALS.iter().fold(
        PluginBuilder::new(STD_PLUGIN).prefix("std"),
        |plugin, (goal, phase)| plugin.mojo(MojoBuilder::new(goal).phase(phase)),
    )
}
