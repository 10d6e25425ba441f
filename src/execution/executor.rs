//! Step executor - runs a job's steps in order, stopping at the first failure

use crate::{
    core::{FailureKind, JobContext, PlatformJob, Step, StepAction, StepFailure, StepState},
    execution::{
        engine::{EventSink, ExecutionEvent},
        provisioner::ToolchainProvisioner,
    },
    runner::{CommandRunner, CommandSpec},
};
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every command exited zero
    Success { output: String },
    /// A command exited non-zero, timed out or could not start
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
    },
}

/// Executes the steps of a platform job
#[derive(Debug, Clone)]
pub struct StepExecutor {
    provisioner: ToolchainProvisioner,
    /// Lines of output kept in a failure report
    tail_lines: usize,
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new(ToolchainProvisioner::default())
    }
}

impl StepExecutor {
    pub const DEFAULT_TAIL_LINES: usize = 40;

    pub fn new(provisioner: ToolchainProvisioner) -> Self {
        Self {
            provisioner,
            tail_lines: Self::DEFAULT_TAIL_LINES,
        }
    }

    /// Keep the last `lines` lines of a failing step's output
    pub fn with_tail_lines(mut self, lines: usize) -> Self {
        self.tail_lines = lines;
        self
    }

    /// The commands a step expands to for this job
    pub fn commands_for(&self, step: &Step, context: &JobContext) -> Result<Vec<CommandSpec>, String> {
        let commands = match &step.action {
            StepAction::Checkout => {
                // clone into the (empty) workdir itself, never below it
                let mut commands = vec![CommandSpec::new(
                    "git",
                    [
                        "clone".to_string(),
                        "--quiet".to_string(),
                        "--no-hardlinks".to_string(),
                        context.source.display().to_string(),
                        ".".to_string(),
                    ],
                )];
                if let Some(revision) = &context.revision {
                    commands.push(
                        CommandSpec::new("git", ["checkout", "--quiet", "--detach", revision.as_str()])
                            .current_dir(&context.workdir),
                    );
                }
                commands
            }
            StepAction::Toolchain { override_default } => {
                self.provisioner
                    .install(&context.toolchain, &context.workdir, *override_default)
            }
            StepAction::Component { name } => {
                vec![self.provisioner.add_component(&context.toolchain, name)]
            }
            StepAction::Run { .. } => {
                let argv = match step.command_line() {
                    Some(Ok(argv)) => argv,
                    Some(Err(e)) => return Err(format!("Malformed command line: {}", e)),
                    None => Vec::new(),
                };
                let command = CommandSpec::from_argv(&argv)
                    .ok_or_else(|| "Empty command line".to_string())?
                    .current_dir(&context.workdir);
                vec![command]
            }
        };

        // every command of a job runs inside that job's working directory
        let timeout = step.timeout_secs.map(Duration::from_secs);
        Ok(commands
            .into_iter()
            .map(|command| {
                let command = match command.cwd {
                    Some(_) => command,
                    None => command.current_dir(&context.workdir),
                };
                command.envs(&step.env).timeout(timeout)
            })
            .collect())
    }

    /// Run one step's commands in order on the job's runner
    pub async fn execute(
        &self,
        step: &Step,
        context: &JobContext,
        runner: &dyn CommandRunner,
    ) -> ExecutionResult {
        info!("[{}] Executing step: {}", context.job_id, step.id);

        let commands = match self.commands_for(step, context) {
            Ok(commands) => commands,
            Err(error) => {
                return ExecutionResult::Failed {
                    error,
                    exit_code: None,
                    output: String::new(),
                }
            }
        };

        let mut output = String::new();
        for command in &commands {
            debug!("[{}] {}", context.job_id, command.display());
            match runner.run(command).await {
                Ok(result) => {
                    output.push_str(&result.combined());
                    if !result.success() {
                        let error = match result.exit_code {
                            Some(code) => format!("`{}` exited with code {}", command.display(), code),
                            None => format!("`{}` was terminated by a signal", command.display()),
                        };
                        return ExecutionResult::Failed {
                            error,
                            exit_code: result.exit_code,
                            output,
                        };
                    }
                }
                Err(e) => {
                    return ExecutionResult::Failed {
                        error: e.to_string(),
                        exit_code: None,
                        output,
                    };
                }
            }
        }

        ExecutionResult::Success { output }
    }

    /// Run a whole job: steps strictly in order, fail-fast unless a step is
    /// marked continuable. Never touches another job's state.
    pub async fn run_job(
        &self,
        job: &mut PlatformJob,
        context: &JobContext,
        runner: &dyn CommandRunner,
        events: &EventSink,
    ) {
        job.start();
        events.emit(ExecutionEvent::JobStarted {
            job_id: job.id.clone(),
            os: job.os,
            toolchain: job.toolchain.clone(),
        });

        if let Err(e) = prepare_workdir(context).await {
            warn!("[{}] Could not prepare working directory: {}", job.id, e);
            job.reject(StepFailure {
                step_id: "workspace".to_string(),
                step_name: "Prepare working directory".to_string(),
                kind: FailureKind::Provisioning,
                exit_code: None,
                error: e.to_string(),
                output: String::new(),
            });
            self.finish(job, events);
            return;
        }

        for index in 0..job.steps.len() {
            if job.failure.is_some() {
                break;
            }

            let step = job.steps[index].clone();
            let started_at = Utc::now();
            job.steps[index].state = StepState::Running { started_at };
            events.emit(ExecutionEvent::StepStarted {
                job_id: job.id.clone(),
                step_id: step.id.clone(),
                name: step.name.clone(),
            });

            match self.execute(&step, context, runner).await {
                ExecutionResult::Success { output } => {
                    job.steps[index].state = StepState::Passed {
                        output,
                        started_at,
                        completed_at: Utc::now(),
                    };
                    events.emit(ExecutionEvent::StepPassed {
                        job_id: job.id.clone(),
                        step_id: step.id.clone(),
                    });
                }
                ExecutionResult::Failed {
                    error,
                    exit_code,
                    output,
                } => {
                    warn!("[{}] Step {} failed: {}", job.id, step.id, error);
                    events.emit(ExecutionEvent::StepFailed {
                        job_id: job.id.clone(),
                        step_id: step.id.clone(),
                        kind: step.failure_kind,
                        error: error.clone(),
                        continued: step.continue_on_failure,
                    });

                    if !step.continue_on_failure {
                        job.failure = Some(StepFailure {
                            step_id: step.id.clone(),
                            step_name: step.name.clone(),
                            kind: step.failure_kind,
                            exit_code,
                            error: error.clone(),
                            output: tail(&output, self.tail_lines),
                        });
                    }

                    job.steps[index].state = StepState::Failed {
                        error,
                        exit_code,
                        output,
                        started_at,
                        failed_at: Utc::now(),
                    };
                }
            }
        }

        job.finish();
        self.finish(job, events);
    }

    fn finish(&self, job: &PlatformJob, events: &EventSink) {
        for step in &job.steps {
            if let StepState::Skipped { reason } = &step.state {
                events.emit(ExecutionEvent::StepSkipped {
                    job_id: job.id.clone(),
                    step_id: step.id.clone(),
                    reason: reason.clone(),
                });
            }
        }

        info!("[{}] Job finished: {}", job.id, job.verdict());
        events.emit(ExecutionEvent::JobFinished {
            job_id: job.id.clone(),
            verdict: job.verdict(),
            failure: job.failure.clone(),
        });
    }
}

/// Replace a stale checkout with an empty working directory
async fn prepare_workdir(context: &JobContext) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(&context.workdir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(&context.workdir).await
}

/// Last `lines` lines of `output`
pub fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
