// src/exec/shell.rs

//! Shell-command goal executor.

use std::process::Command;

use tracing::{debug, info, warn};

use crate::engine::Session;
use crate::errors::MojoError;
use crate::exec::MojoExecutor;
use crate::plugin::MojoExecution;
use crate::project::Project;

/// Runs the `cmd` of every goal descriptor through the platform shell.
///
/// Goals without a command succeed without doing anything. The project's
/// coordinates and each configured parameter are exported as environment
/// variables (`WEAVE_PROJECT`, `WEAVE_GOAL`, `WEAVE_PARAM_<NAME>`, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellMojoExecutor;

impl ShellMojoExecutor {
    pub fn new() -> Self {
        Self
    }

    fn run_one(&self, project: &Project, execution: &MojoExecution) -> Result<(), MojoError> {
        let goal = execution.descriptor.id();
        let Some(cmd_line) = execution.descriptor.command.as_deref() else {
            debug!(project = %project.id, goal = %goal, "goal has no command; nothing to run");
            return Ok(());
        };

        info!(
            project = %project.id,
            goal = %goal,
            execution = %execution.execution_id,
            cmd = %cmd_line,
            "running goal"
        );

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd_line);
            c
        };

        cmd.current_dir(&project.basedir)
            .env("WEAVE_PROJECT", project.id.as_str())
            .env("WEAVE_GROUP_ID", &project.group_id)
            .env("WEAVE_ARTIFACT_ID", &project.artifact_id)
            .env("WEAVE_VERSION", &project.version)
            .env("WEAVE_GOAL", execution.goal())
            .env("WEAVE_EXECUTION_ID", &execution.execution_id);
        for (name, value) in &execution.configuration {
            cmd.env(param_env_name(name), value);
        }

        let output = cmd.output().map_err(|e| MojoError::Failure {
            goal: goal.clone(),
            message: format!("failed to spawn '{cmd_line}': {e}"),
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(project = %project.artifact_id, goal = %execution.goal(), "{}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            if output.status.success() {
                debug!(project = %project.artifact_id, goal = %execution.goal(), "stderr: {}", line);
            } else {
                warn!(project = %project.artifact_id, goal = %execution.goal(), "stderr: {}", line);
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(project = %project.id, goal = %goal, exit_code = code, "goal failed");
            Err(MojoError::Failure {
                goal,
                message: format!("command exited with code {code}"),
            })
        }
    }
}

impl MojoExecutor for ShellMojoExecutor {
    fn execute(
        &self,
        _session: &Session,
        project: &Project,
        executions: &[MojoExecution],
    ) -> Result<(), MojoError> {
        for execution in executions {
            self.run_one(project, execution)?;
        }
        Ok(())
    }
}

/// `outputDirectory` -> `WEAVE_PARAM_OUTPUTDIRECTORY`.
fn param_env_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("WEAVE_PARAM_{cleaned}")
}
