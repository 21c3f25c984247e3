// src/exec/configurator.rs

//! Execution configuration: merging and finalization.
//!
//! A [`MojoExecutionConfigurator`] is chosen by the goal descriptor's
//! `configurator` name, falling back to `"default"` when the name is unset
//! or unknown.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::plugin::MojoExecution;
use crate::project::{Configuration, Project};

pub const DEFAULT_CONFIGURATOR: &str = "default";

/// Computes the effective configuration of an execution.
pub trait MojoExecutionConfigurator: Send + Sync {
    /// Fill `execution.configuration` from the project model.
    ///
    /// With `allow_plugin_level`, plugin-wide configuration is merged in
    /// below the execution's own configuration.
    fn configure(&self, project: &Project, execution: &mut MojoExecution, allow_plugin_level: bool);
}

/// Plugin-level < execution-level < values already on the execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMojoExecutionConfigurator;

impl MojoExecutionConfigurator for DefaultMojoExecutionConfigurator {
    fn configure(&self, project: &Project, execution: &mut MojoExecution, allow_plugin_level: bool) {
        let Some(plugin) = project.plugin(&execution.descriptor.plugin_key) else {
            return;
        };

        let mut merged = Configuration::new();
        if allow_plugin_level {
            merged.extend(plugin.configuration.clone());
        }
        if let Some(declared) = plugin
            .executions
            .iter()
            .find(|e| e.id == execution.execution_id)
        {
            merged.extend(declared.configuration.clone());
        }
        merged.extend(std::mem::take(&mut execution.configuration));
        execution.configuration = merged;
    }
}

/// Configurators by name; always contains `"default"`.
#[derive(Clone)]
pub struct ConfiguratorRegistry {
    configurators: HashMap<String, Arc<dyn MojoExecutionConfigurator>>,
}

impl std::fmt::Debug for ConfiguratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.configurators.keys().collect();
        names.sort();
        f.debug_struct("ConfiguratorRegistry")
            .field("configurators", &names)
            .finish()
    }
}

impl Default for ConfiguratorRegistry {
    fn default() -> Self {
        let mut configurators: HashMap<String, Arc<dyn MojoExecutionConfigurator>> = HashMap::new();
        configurators.insert(
            DEFAULT_CONFIGURATOR.to_string(),
            Arc::new(DefaultMojoExecutionConfigurator),
        );
        Self { configurators }
    }
}

impl ConfiguratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, configurator: Arc<dyn MojoExecutionConfigurator>) {
        self.configurators.insert(name.into(), configurator);
    }

    /// Configurator for `name`, or the default one.
    pub fn get(&self, name: Option<&str>) -> Arc<dyn MojoExecutionConfigurator> {
        let name = name.unwrap_or(DEFAULT_CONFIGURATOR);
        match self.configurators.get(name) {
            Some(c) => Arc::clone(c),
            None => {
                debug!(configurator = name, "unknown configurator; using default");
                self.default_configurator()
            }
        }
    }

    fn default_configurator(&self) -> Arc<dyn MojoExecutionConfigurator> {
        self.configurators
            .get(DEFAULT_CONFIGURATOR)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultMojoExecutionConfigurator))
    }
}

/// Keep only the parameters the goal declares.
///
/// Each parameter is looked up by name, then by alias, then falls back to
/// its default value. Parameters with none of the three are left unset.
pub fn finalize_configuration(execution: &mut MojoExecution) {
    let raw = std::mem::take(&mut execution.configuration);
    let mut finalized = Configuration::new();

    for parameter in &execution.descriptor.parameters {
        let value = raw
            .get(&parameter.name)
            .or_else(|| parameter.alias.as_ref().and_then(|a| raw.get(a)))
            .or(parameter.default_value.as_ref());
        if let Some(value) = value {
            finalized.insert(parameter.name.clone(), value.clone());
        }
    }

    execution.configuration = finalized;
}
