// src/exec/executor.rs

use crate::engine::Session;
use crate::errors::MojoError;
use crate::plugin::MojoExecution;
use crate::project::Project;

/// Runs the executions bound to one build step.
///
/// Production code uses [`ShellMojoExecutor`](super::ShellMojoExecutor);
/// tests provide recording implementations that never spawn processes.
pub trait MojoExecutor: Send + Sync {
    /// Run `executions` for `project`, in order, stopping at the first
    /// failure.
    fn execute(
        &self,
        session: &Session,
        project: &Project,
        executions: &[MojoExecution],
    ) -> Result<(), MojoError>;
}
