// src/plugin/resolver.rs

use std::sync::Arc;

use crate::errors::{Result, WeaveError};
use crate::plugin::{GoalSpec, MojoDescriptor, PluginDescriptor};
use crate::project::{Plugin, Project};

/// Looks up plugin and goal descriptors.
pub trait MojoResolver: Send + Sync {
    /// Descriptor of the plugin with key `group:artifact`.
    fn plugin_descriptor(&self, plugin_key: &str) -> Result<Arc<PluginDescriptor>>;

    /// Descriptor for `goal` of a plugin declared by `project`.
    fn mojo_descriptor(
        &self,
        project: &Project,
        plugin: &Plugin,
        goal: &str,
    ) -> Result<Arc<MojoDescriptor>> {
        let _ = project;
        let descriptor = self.plugin_descriptor(&plugin.key())?;
        descriptor
            .mojo(goal)
            .cloned()
            .ok_or_else(|| WeaveError::MojoNotFound {
                goal: goal.to_string(),
                plugin: plugin.key(),
            })
    }

    /// Descriptor for a goal requested on the command line.
    fn cli_mojo_descriptor(&self, project: &Project, goal: &GoalSpec) -> Result<Arc<MojoDescriptor>>;
}

/// Resolver over a fixed set of plugin descriptors.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMojoResolver {
    plugins: Vec<Arc<PluginDescriptor>>,
}

impl InMemoryMojoResolver {
    pub fn new(plugins: Vec<PluginDescriptor>) -> Self {
        Self {
            plugins: plugins.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn plugins(&self) -> &[Arc<PluginDescriptor>] {
        &self.plugins
    }

    fn by_prefix(&self, prefix: &str) -> Option<&Arc<PluginDescriptor>> {
        self.plugins
            .iter()
            .find(|p| p.goal_prefix.as_deref() == Some(prefix))
            // `compiler` also matches `org.example:compiler` without a prefix.
            .or_else(|| {
                self.plugins
                    .iter()
                    .find(|p| p.goal_prefix.is_none() && p.artifact_id == prefix)
            })
    }
}

impl MojoResolver for InMemoryMojoResolver {
    fn plugin_descriptor(&self, plugin_key: &str) -> Result<Arc<PluginDescriptor>> {
        self.plugins
            .iter()
            .find(|p| p.key() == plugin_key)
            .cloned()
            .ok_or_else(|| WeaveError::PluginNotFound(plugin_key.to_string()))
    }

    fn cli_mojo_descriptor(&self, project: &Project, goal: &GoalSpec) -> Result<Arc<MojoDescriptor>> {
        let _ = project;
        let plugin = match goal {
            GoalSpec::Prefixed { prefix, .. } => self
                .by_prefix(prefix)
                .cloned()
                .ok_or_else(|| {
                    WeaveError::PluginNotFound(format!("no plugin found for prefix '{prefix}'"))
                })?,
            GoalSpec::Qualified {
                group_id,
                artifact_id,
                ..
            } => self.plugin_descriptor(&format!("{group_id}:{artifact_id}"))?,
        };

        plugin
            .mojo(goal.goal())
            .cloned()
            .ok_or_else(|| WeaveError::MojoNotFound {
                goal: goal.goal().to_string(),
                plugin: plugin.key(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> InMemoryMojoResolver {
        let compiler = PluginDescriptor {
            group_id: "org.example.plugins".to_string(),
            artifact_id: "compiler".to_string(),
            goal_prefix: Some("cc".to_string()),
            mojos: vec![Arc::new(MojoDescriptor::new(
                "org.example.plugins:compiler",
                "compile",
            ))],
            ..Default::default()
        };
        let docs = PluginDescriptor {
            group_id: "org.example.plugins".to_string(),
            artifact_id: "docs".to_string(),
            mojos: vec![Arc::new(MojoDescriptor::new("org.example.plugins:docs", "render"))],
            ..Default::default()
        };
        InMemoryMojoResolver::new(vec![compiler, docs])
    }

    #[test]
    fn resolves_declared_plugin_goals() {
        let resolver = resolver();
        let project = Project::new("org.example", "app", "1.0");
        let plugin = Plugin::new("org.example.plugins", "compiler");

        let mojo = resolver.mojo_descriptor(&project, &plugin, "compile").unwrap();
        assert_eq!(mojo.goal, "compile");

        let err = resolver.mojo_descriptor(&project, &plugin, "link").unwrap_err();
        assert!(matches!(err, WeaveError::MojoNotFound { .. }));

        let missing = Plugin::new("org.example.plugins", "missing");
        let err = resolver.mojo_descriptor(&project, &missing, "x").unwrap_err();
        assert!(matches!(err, WeaveError::PluginNotFound(_)));
    }

    #[test]
    fn resolves_cli_goals_by_prefix_or_coordinates() {
        let resolver = resolver();
        let project = Project::new("org.example", "app", "1.0");

        let by_prefix = GoalSpec::parse("cc:compile").unwrap();
        assert_eq!(resolver.cli_mojo_descriptor(&project, &by_prefix).unwrap().goal, "compile");

        let by_artifact = GoalSpec::parse("docs:render").unwrap();
        assert_eq!(resolver.cli_mojo_descriptor(&project, &by_artifact).unwrap().goal, "render");

        let qualified = GoalSpec::parse("org.example.plugins:docs:render@site").unwrap();
        assert_eq!(resolver.cli_mojo_descriptor(&project, &qualified).unwrap().goal, "render");

        let unknown = GoalSpec::parse("nope:render").unwrap();
        assert!(resolver.cli_mojo_descriptor(&project, &unknown).is_err());
    }
}
