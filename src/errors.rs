// src/errors.rs

//! Crate-wide error types.
//!
//! - [`WeaveError`] covers configuration, model and planning problems. These
//!   surface immediately and are never retried.
//! - [`MojoError`] is what a plugin goal reports when it fails.
//! - [`BuildError`] is captured on a build step and aggregated per project by
//!   the project's teardown step.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Cycle detected in project graph: {0}")]
    DependencyCycle(String),

    #[error(
        "Unknown lifecycle phase \"{phase}\". You must specify a valid lifecycle phase or a goal \
         in the format <plugin-prefix>:<goal> or <plugin-group-id>:<plugin-artifact-id>[:<plugin-version>]:<goal>. \
         Available lifecycle phases are: {available}."
    )]
    LifecyclePhaseNotFound { phase: String, available: String },

    #[error("Lifecycle not found: {0}")]
    LifecycleNotFound(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Could not find goal '{goal}' in plugin {plugin}")]
    MojoNotFound { goal: String, plugin: String },

    #[error("Required step '{step}' not found for project {project}")]
    StepNotFound { project: String, step: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WeaveError>;

/// Failure reported by a single plugin goal.
///
/// `Failure` is the ordinary, expected kind of failure (compilation error,
/// failing test). `Fatal` means the build's invariants may be broken and the
/// whole reactor must stop, whatever failure behaviour was configured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MojoError {
    #[error("goal {goal} failed: {message}")]
    Failure { goal: String, message: String },

    #[error("goal {goal} aborted: {message}")]
    Fatal { goal: String, message: String },
}

/// Error captured on a build step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("{project}: {source}")]
    Mojo {
        project: String,
        step: String,
        #[source]
        source: MojoError,
    },

    #[error("{project}: step '{step}' panicked: {message}")]
    Panicked {
        project: String,
        step: String,
        message: String,
    },

    #[error("{project}: build planning failed: {message}")]
    Planning { project: String, message: String },

    #[error("build stalled: {} step(s) never became ready (first: {})", steps.len(), steps.first().map(String::as_str).unwrap_or("-"))]
    Stalled { steps: Vec<String> },

    #[error("{primary} (and {} more)", secondary.len())]
    Composite {
        primary: Box<BuildError>,
        secondary: Vec<BuildError>,
    },
}

impl BuildError {
    /// Non-ordinary errors force a fail-fast halt of the reactor.
    pub fn is_fatal(&self) -> bool {
        match self {
            BuildError::Mojo { source, .. } => matches!(source, MojoError::Fatal { .. }),
            BuildError::Panicked { .. }
            | BuildError::Planning { .. }
            | BuildError::Stalled { .. } => true,
            BuildError::Composite { primary, secondary } => {
                primary.is_fatal() || secondary.iter().any(BuildError::is_fatal)
            }
        }
    }

    /// Fold several sibling errors into one; the first one stays primary.
    ///
    /// Returns `None` for an empty list.
    pub fn combine(mut errors: Vec<BuildError>) -> Option<BuildError> {
        if errors.is_empty() {
            return None;
        }
        let primary = errors.remove(0);
        if errors.is_empty() {
            Some(primary)
        } else {
            Some(BuildError::Composite {
                primary: Box::new(primary),
                secondary: errors,
            })
        }
    }

    /// Secondary causes attached to a composite error.
    pub fn secondary(&self) -> &[BuildError] {
        match self {
            BuildError::Composite { secondary, .. } => secondary,
            _ => &[],
        }
    }
}
