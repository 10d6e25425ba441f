//! Main execution engine - expands the matrix, runs the jobs, gates the push

use crate::{
    core::{
        FailureKind, JobOutcome, MatrixSelection, OsFamily, Pipeline, PipelineOutcome,
        PipelineTrigger, StepFailure, ToolchainVersion, Verdict,
    },
    execution::{ExecutionScheduler, GateAggregator, SchedulingStrategy, StepExecutor},
    runner::RunnerPool,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        trigger_id: Uuid,
        pipeline_name: String,
        total_jobs: usize,
        selected_jobs: usize,
    },
    JobStarted {
        job_id: String,
        os: OsFamily,
        toolchain: ToolchainVersion,
    },
    StepStarted {
        job_id: String,
        step_id: String,
        name: String,
    },
    StepPassed {
        job_id: String,
        step_id: String,
    },
    StepFailed {
        job_id: String,
        step_id: String,
        kind: FailureKind,
        error: String,
        continued: bool,
    },
    StepSkipped {
        job_id: String,
        step_id: String,
        reason: String,
    },
    JobFinished {
        job_id: String,
        verdict: Verdict,
        failure: Option<StepFailure>,
    },
    PipelineFinished {
        trigger_id: Uuid,
        verdict: Verdict,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Read-only fan-out of events to the registered handlers
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<Vec<EventHandler>>,
}

impl EventSink {
    pub fn new(handlers: Vec<EventHandler>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    pub fn emit(&self, event: ExecutionEvent) {
        for handler in self.handlers.iter() {
            handler(&event);
        }
    }
}

/// Where jobs get their sources and their private working directories
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Repository each job checks out
    pub source: PathBuf,
    /// Parent of the per-run directories, each holding that run's job checkouts
    pub work_root: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        let work_root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("matrixci")
            .join("work");
        Self {
            source: PathBuf::from("."),
            work_root,
        }
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    pool: RunnerPool,
    executor: Arc<StepExecutor>,
    strategy: SchedulingStrategy,
    settings: RunSettings,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn new(pool: RunnerPool, strategy: SchedulingStrategy) -> Self {
        Self {
            pool,
            executor: Arc::new(StepExecutor::default()),
            strategy,
            settings: RunSettings::default(),
            event_handlers: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Run every selected job of the matrix for one trigger.
    ///
    /// Jobs run as independent tasks; a failing job never stops its
    /// siblings. Returns `Err` only when nothing could be run at all.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        trigger: &PipelineTrigger,
        selection: &MatrixSelection,
    ) -> Result<PipelineOutcome> {
        let cells = pipeline.cells();
        let total_jobs = cells.len();
        let selected: Vec<_> = cells.into_iter().filter(|c| selection.includes(c)).collect();
        if selected.is_empty() {
            anyhow::bail!(
                "No jobs of '{}' match the selected os/toolchain values",
                pipeline.name
            );
        }

        let events = EventSink::new(self.event_handlers.clone());
        info!(
            "Starting pipeline {} for {} ({}): {} of {} jobs",
            pipeline.name,
            trigger.git_ref,
            trigger.short_sha(),
            selected.len(),
            total_jobs
        );
        events.emit(ExecutionEvent::PipelineStarted {
            trigger_id: trigger.id,
            pipeline_name: pipeline.name.clone(),
            total_jobs,
            selected_jobs: selected.len(),
        });

        let scheduler = ExecutionScheduler::new(self.strategy, selected.len());
        let revision = Some(trigger.sha.clone()).filter(|sha| !sha.is_empty());
        // <work root>/<trigger id>/<job id>: concurrent runs never share a checkout
        let run_root = self.settings.work_root.join(trigger.id.to_string());
        let mut handles = Vec::with_capacity(selected.len());

        for cell in &selected {
            let context = pipeline
                .context_for(cell, &self.settings.source, &run_root)
                .with_revision(revision.clone());
            let mut job = pipeline.job_for(cell, &context);
            let fallback = job.clone();

            let runner = self.pool.get(cell.os);
            let executor = self.executor.clone();
            let events = events.clone();
            let permits = scheduler.permits();

            let handle = tokio::spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                match runner {
                    Some(runner) => {
                        executor.run_job(&mut job, &context, runner.as_ref(), &events).await;
                    }
                    None => {
                        warn!("[{}] No runner available for {}", job.id, job.os);
                        job.reject(StepFailure {
                            step_id: "runner".to_string(),
                            step_name: "Acquire runner".to_string(),
                            kind: FailureKind::Provisioning,
                            exit_code: None,
                            error: format!("No runner available for {}", job.os),
                            output: String::new(),
                        });
                        events.emit(ExecutionEvent::JobFinished {
                            job_id: job.id.clone(),
                            verdict: job.verdict(),
                            failure: job.failure.clone(),
                        });
                    }
                }
                job.outcome()
            });
            handles.push((fallback, handle));
        }

        let mut gate = GateAggregator::new(handles.len());
        for (mut fallback, handle) in handles {
            let outcome: JobOutcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("[{}] Job task aborted: {}", fallback.id, e);
                    fallback.reject(StepFailure {
                        step_id: "runner".to_string(),
                        step_name: "Job task".to_string(),
                        kind: FailureKind::Provisioning,
                        exit_code: None,
                        error: e.to_string(),
                        output: String::new(),
                    });
                    fallback.outcome()
                }
            };
            gate.collect(outcome);
        }
        remove_run_root(&run_root).await;

        let outcome = gate.finish(trigger, &pipeline.name);
        info!(
            "Pipeline {} finished: {} ({}/{} jobs passed)",
            pipeline.name,
            outcome.verdict,
            outcome.passed_jobs(),
            outcome.jobs.len()
        );
        events.emit(ExecutionEvent::PipelineFinished {
            trigger_id: trigger.id,
            verdict: outcome.verdict,
        });

        Ok(outcome)
    }
}

async fn remove_run_root(run_root: &Path) {
    match tokio::fs::remove_dir_all(run_root).await {
        Ok(()) => debug!("Removed {}", run_root.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", run_root.display(), e),
    }
}
