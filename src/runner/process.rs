//! Local process runner - spawns commands on this machine

use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs commands as child processes of this process
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    /// Spawn the command and wait for it.
    ///
    /// # Errors
    /// Returns `RunnerError` if:
    /// - The program cannot be spawned
    /// - The command exceeds its timeout (the child is killed)
    ///
    /// A non-zero exit is not an error; it is reported in the output.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        debug!("Running: {}", spec.display());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }

        let started = Instant::now();
        let output = match spec.timeout {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| RunnerError::Timeout {
                    program: spec.program.clone(),
                    secs: limit.as_secs(),
                })?,
            None => command.output().await,
        }
        .map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        };

        if result.success() {
            debug!(
                "`{}` finished in {:?} ({} bytes of output)",
                spec.program,
                result.duration,
                result.stdout.len() + result.stderr.len()
            );
        } else {
            warn!(
                "`{}` exited with code {:?}",
                spec.display(),
                result.exit_code
            );
        }

        Ok(result)
    }
}
