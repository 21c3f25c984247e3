// src/engine/events.rs

//! Observational execution events.

use tracing::{error, info, warn};

use crate::errors::BuildError;
use crate::project::ProjectId;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    SessionStarted,
    SessionEnded,
    ProjectStarted { project: ProjectId },
    ProjectSucceeded { project: ProjectId },
    ProjectSkipped { project: ProjectId },
    ProjectFailed { project: ProjectId, error: BuildError },
}

/// Receives execution events. Must not influence the build.
pub trait ExecutionListener: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Default listener: one log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ExecutionListener for LoggingListener {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::SessionStarted => info!("build session started"),
            ExecutionEvent::SessionEnded => info!("build session ended"),
            ExecutionEvent::ProjectStarted { project } => {
                info!(project = %project, "building project")
            }
            ExecutionEvent::ProjectSucceeded { project } => {
                info!(project = %project, "project succeeded")
            }
            ExecutionEvent::ProjectSkipped { project } => {
                warn!(project = %project, "project skipped")
            }
            ExecutionEvent::ProjectFailed { project, error } => {
                error!(project = %project, error = %error, "project failed")
            }
        }
    }
}
