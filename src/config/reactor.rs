// src/config/reactor.rs

//! Turning a validated [`ConfigFile`] into the reactor model: projects,
//! plugin descriptors, extra lifecycles and the execution request.

use std::path::Path;
use std::sync::Arc;

use crate::config::model::{ConfigFile, MojoSection, split_plugin_key};
use crate::engine::ExecutionRequest;
use crate::lifecycle::{Lifecycle, Phase};
use crate::plugin::{LifecycleOverlay, MojoDescriptor, Parameter, PluginDescriptor};
use crate::project::{Plugin, PluginExecution, Project, ProjectId};
use crate::types::FailureBehaviour;

impl ConfigFile {
    /// Coordinates of the project keyed `artifact`.
    pub fn project_id(&self, artifact: &str) -> Option<ProjectId> {
        let section = self.project.get(artifact)?;
        let group = section.group.as_deref().unwrap_or(&self.build.group);
        let version = section.version.as_deref().unwrap_or(&self.build.version);
        Some(ProjectId::new(group, artifact, version))
    }

    /// The project named by `[build].root`, if any.
    pub fn root_project(&self) -> Option<ProjectId> {
        self.build.root.as_deref().and_then(|r| self.project_id(r))
    }

    /// Every project, with base directories resolved against `base_dir`.
    pub fn projects(&self, base_dir: &Path) -> Vec<Project> {
        self.project
            .iter()
            .map(|(artifact, section)| {
                let group = section.group.as_deref().unwrap_or(&self.build.group);
                let version = section.version.as_deref().unwrap_or(&self.build.version);
                let mut project = Project::new(group, artifact, version);

                project.basedir = match &section.dir {
                    Some(dir) => base_dir.join(dir),
                    None => base_dir.to_path_buf(),
                };
                project.dependencies = section
                    .depends_on
                    .iter()
                    .filter_map(|d| self.project_id(d))
                    .collect();
                project.modules = section
                    .modules
                    .iter()
                    .filter_map(|m| self.project_id(m))
                    .collect();
                project.plugins = section
                    .plugin
                    .iter()
                    .filter_map(|usage| {
                        let (group_id, artifact_id) = split_plugin_key(&usage.id)?;
                        let mut plugin = Plugin::new(group_id, artifact_id);
                        plugin.version = usage.version.clone().or_else(|| {
                            self.plugin.get(&usage.id).and_then(|p| p.version.clone())
                        });
                        plugin.default_binding = usage.default_binding;
                        plugin.configuration = usage.configuration.clone();
                        plugin.executions = usage
                            .execution
                            .iter()
                            .map(|e| PluginExecution {
                                id: e.id.clone(),
                                phase: e.phase.clone(),
                                goals: e.goals.clone(),
                                priority: e.priority,
                                configuration: e.configuration.clone(),
                            })
                            .collect();
                        Some(plugin)
                    })
                    .collect();
                project
            })
            .collect()
    }

    pub fn plugin_descriptors(&self) -> Vec<PluginDescriptor> {
        self.plugin
            .iter()
            .filter_map(|(key, section)| {
                let (group_id, artifact_id) = split_plugin_key(key)?;
                let mojos = section
                    .mojo
                    .iter()
                    .map(|(goal, mojo)| Arc::new(mojo_descriptor(key, section.version.clone(), goal, mojo)))
                    .collect();
                let lifecycles = section
                    .lifecycle
                    .iter()
                    .map(|(id, overlay)| LifecycleOverlay {
                        id: id.clone(),
                        phases: overlay
                            .phases
                            .iter()
                            .map(|p| (p.name.clone(), p.goals.clone()))
                            .collect(),
                    })
                    .collect();
                Some(PluginDescriptor {
                    group_id: group_id.to_string(),
                    artifact_id: artifact_id.to_string(),
                    version: section.version.clone(),
                    goal_prefix: section.prefix.clone(),
                    mojos,
                    lifecycles,
                })
            })
            .collect()
    }

    /// Extra lifecycles from `[lifecycle.<id>]`; each phase runs after the
    /// previous one.
    pub fn extra_lifecycles(&self) -> Vec<Lifecycle> {
        self.lifecycle
            .iter()
            .map(|(id, section)| {
                let mut phases = Vec::with_capacity(section.phases.len());
                let mut previous: Option<&str> = None;
                for name in &section.phases {
                    let mut phase = Phase::new(name.as_str());
                    if let Some(prev) = previous {
                        phase = phase.after(prev);
                    }
                    phases.push(phase);
                    previous = Some(name.as_str());
                }
                Lifecycle::new(id.as_str(), phases, Vec::new())
            })
            .collect()
    }

    /// Request built from `[build]`; command-line values win.
    pub fn request(
        &self,
        threads: Option<usize>,
        failure_behaviour: Option<FailureBehaviour>,
    ) -> ExecutionRequest {
        ExecutionRequest {
            degree_of_concurrency: threads.or(self.build.threads).unwrap_or(1).max(1),
            failure_behaviour: failure_behaviour.unwrap_or(self.build.failure_behaviour),
        }
    }
}

fn mojo_descriptor(
    plugin_key: &str,
    plugin_version: Option<String>,
    goal: &str,
    mojo: &MojoSection,
) -> MojoDescriptor {
    let mut descriptor = MojoDescriptor::new(plugin_key, goal);
    descriptor.plugin_version = plugin_version;
    descriptor.phase = mojo.phase.clone();
    descriptor.execute_goal = mojo.fork_goal.clone();
    descriptor.execute_phase = mojo.fork_phase.clone();
    descriptor.execute_lifecycle = mojo.fork_lifecycle.clone();
    descriptor.thread_safe = mojo.thread_safe;
    descriptor.aggregator = mojo.aggregator;
    descriptor.dependency_resolution_required = mojo.requires_dependency_resolution;
    descriptor.dependency_collection_required = mojo.requires_dependency_collection;
    descriptor.configurator = mojo.configurator.clone();
    descriptor.command = mojo.cmd.clone();
    descriptor.parameters = mojo
        .parameters
        .iter()
        .map(|p| Parameter {
            name: p.name.clone(),
            alias: p.alias.clone(),
            default_value: p.default.clone(),
        })
        .collect();
    descriptor
}
