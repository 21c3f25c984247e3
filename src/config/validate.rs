// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, split_plugin_key};
use crate::errors::{Result, WeaveError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WeaveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.build,
            raw.project,
            raw.plugin,
            raw.lifecycle,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_projects(cfg)?;
    validate_build_section(cfg)?;
    validate_project_references(cfg)?;
    validate_plugins(cfg)?;
    validate_dependency_graph(cfg)?;
    Ok(())
}

fn ensure_has_projects(cfg: &RawConfigFile) -> Result<()> {
    if cfg.project.is_empty() {
        return Err(WeaveError::ConfigError(
            "config must contain at least one [project.<artifact>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_build_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.threads == Some(0) {
        return Err(WeaveError::ConfigError(
            "[build].threads must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(root) = &cfg.build.root {
        if !cfg.project.contains_key(root) {
            return Err(WeaveError::ConfigError(format!(
                "[build].root names unknown project '{root}'"
            )));
        }
    }

    Ok(())
}

fn validate_project_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, project) in cfg.project.iter() {
        for dep in project.depends_on.iter() {
            if !cfg.project.contains_key(dep) {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' has unknown dependency '{dep}' in `depends_on`"
                )));
            }
            if dep == name {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' cannot depend on itself in `depends_on`"
                )));
            }
        }
        for module in project.modules.iter() {
            if !cfg.project.contains_key(module) {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' has unknown module '{module}' in `modules`"
                )));
            }
            if module == name {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' cannot list itself in `modules`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_plugins(cfg: &RawConfigFile) -> Result<()> {
    for key in cfg.plugin.keys() {
        if split_plugin_key(key).is_none() {
            return Err(WeaveError::ConfigError(format!(
                "plugin key '{key}' must have the form <group>:<artifact>"
            )));
        }
    }

    for (key, plugin) in cfg.plugin.iter() {
        for (goal, mojo) in plugin.mojo.iter() {
            if let Some(fork_goal) = &mojo.fork_goal {
                if !plugin.mojo.contains_key(fork_goal) {
                    return Err(WeaveError::ConfigError(format!(
                        "goal '{goal}' of plugin '{key}' forks unknown goal '{fork_goal}'"
                    )));
                }
            }
        }
    }

    for (name, project) in cfg.project.iter() {
        for usage in project.plugin.iter() {
            if split_plugin_key(&usage.id).is_none() {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' uses plugin '{}', expected <group>:<artifact>",
                    usage.id
                )));
            }
            let Some(plugin) = cfg.plugin.get(&usage.id) else {
                return Err(WeaveError::ConfigError(format!(
                    "project '{name}' uses undeclared plugin '{}'",
                    usage.id
                )));
            };
            for execution in usage.execution.iter() {
                for goal in execution.goals.iter() {
                    if !plugin.mojo.contains_key(goal) {
                        return Err(WeaveError::ConfigError(format!(
                            "execution '{}' of project '{name}' binds unknown goal '{goal}' of plugin '{}'",
                            execution.id, usage.id
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_dependency_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: upstream -> downstream. `modules` is aggregation only
    // and does not order projects.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.project.keys() {
        graph.add_node(name.as_str());
    }

    for (name, project) in cfg.project.iter() {
        for dep in project.depends_on.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(WeaveError::DependencyCycle(format!(
                "cycle detected in project graph involving project '{node}'"
            )))
        }
    }
}
