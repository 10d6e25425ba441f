//! Test utilities: a scripted command runner and an engine harness

use async_trait::async_trait;
use matrixci::core::config::PipelineConfig;
use matrixci::core::{MatrixSelection, Pipeline, PipelineOutcome, PipelineTrigger};
use matrixci::execution::{ExecutionEngine, ExecutionEvent, RunSettings, SchedulingStrategy};
use matrixci::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError, RunnerPool};

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A command the mock saw, attributed to the job whose directory it ran in
#[derive(Debug, Clone)]
pub struct Call {
    pub job_id: String,
    pub command: String,
    pub cwd: Option<PathBuf>,
}

struct Failure {
    /// None = every job
    job_id: Option<String>,
    fragment: String,
    exit_code: i32,
}

/// Runner that succeeds unless a scripted failure matches
#[derive(Default)]
pub struct MockRunner {
    failures: Vec<Failure>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of `job_id` containing `fragment` exit with `exit_code`
    pub fn fail(mut self, job_id: &str, fragment: &str, exit_code: i32) -> Self {
        self.failures.push(Failure {
            job_id: Some(job_id.to_string()),
            fragment: fragment.to_string(),
            exit_code,
        });
        self
    }

    /// Commands of any job containing `fragment` exit with `exit_code`
    pub fn fail_everywhere(mut self, fragment: &str, exit_code: i32) -> Self {
        self.failures.push(Failure {
            job_id: None,
            fragment: fragment.to_string(),
            exit_code,
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands run for one job, in order
    pub fn commands_for(&self, job_id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.job_id == job_id)
            .map(|call| call.command)
            .collect()
    }

    /// Highest number of commands that were in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let job_id = spec
            .cwd
            .as_ref()
            .and_then(|dir| dir.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let command = spec.display();
        self.calls.lock().unwrap().push(Call {
            job_id: job_id.clone(),
            command: command.clone(),
            cwd: spec.cwd.clone(),
        });

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        let failure = self.failures.iter().find(|failure| {
            failure.job_id.as_deref().map_or(true, |id| id == job_id) && command.contains(&failure.fragment)
        });

        Ok(match failure {
            Some(failure) => CommandOutput {
                exit_code: Some(failure.exit_code),
                stdout: String::new(),
                stderr: format!("error: `{}` failed\n", command),
                duration: Duration::from_millis(1),
            },
            None => CommandOutput {
                exit_code: Some(0),
                stdout: format!("ok: {}\n", command),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            },
        })
    }
}

/// Writes its argument to `marker` in the job directory, waits, and fails
/// if the file no longer holds it afterwards
pub struct MarkerRunner {
    pause: Duration,
}

impl MarkerRunner {
    pub fn new(pause: Duration) -> Self {
        Self { pause }
    }
}

#[async_trait]
impl CommandRunner for MarkerRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let dir = spec.cwd.clone().unwrap_or_default();
        let marker = dir.join("marker");
        let tag = spec.args.join(" ");

        let written = tokio::fs::write(&marker, &tag).await;
        tokio::time::sleep(self.pause).await;
        let found = tokio::fs::read_to_string(&marker).await;

        let (exit_code, stderr) = match (written, found) {
            (Ok(()), Ok(found)) if found == tag => (0, String::new()),
            (Ok(()), Ok(found)) => (1, format!("marker holds {:?}, expected {:?}\n", found, tag)),
            (Err(e), _) | (_, Err(e)) => (1, format!("{}: {}\n", marker.display(), e)),
        };
        Ok(CommandOutput {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr,
            duration: self.pause,
        })
    }
}

pub fn builtin_pipeline() -> Pipeline {
    PipelineConfig::builtin().unwrap().to_pipeline()
}

pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml).unwrap().to_pipeline()
}

pub fn push_trigger() -> PipelineTrigger {
    PipelineTrigger::push("refs/heads/main", "0123456789abcdef0123456789abcdef01234567")
}

pub fn test_settings() -> RunSettings {
    RunSettings {
        source: PathBuf::from("/src/repo"),
        work_root: std::env::temp_dir().join(format!("matrixci-scenario-{}", uuid::Uuid::new_v4())),
    }
}

/// Everything a scenario needs to assert on
pub struct RunResult {
    pub outcome: PipelineOutcome,
    pub events: Vec<ExecutionEvent>,
}

impl RunResult {
    pub fn failed_job_ids(&self) -> Vec<String> {
        self.outcome.failed_jobs().iter().map(|job| job.job_id.clone()).collect()
    }
}

/// Run `pipeline` with `pool` and collect its outcome and events
pub async fn run_with_pool(
    pipeline: &Pipeline,
    pool: RunnerPool,
    strategy: SchedulingStrategy,
    selection: &MatrixSelection,
) -> anyhow::Result<RunResult> {
    let settings = test_settings();
    let work_root = settings.work_root.clone();
    let result = run_with_settings(pipeline, pool, strategy, selection, settings).await;
    let _ = std::fs::remove_dir_all(&work_root);
    result
}

/// Like `run_with_pool`, leaving `settings.work_root` for the caller to inspect
pub async fn run_with_settings(
    pipeline: &Pipeline,
    pool: RunnerPool,
    strategy: SchedulingStrategy,
    selection: &MatrixSelection,
    settings: RunSettings,
) -> anyhow::Result<RunResult> {
    let mut engine = ExecutionEngine::new(pool, strategy).with_settings(settings);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event.clone()));

    let outcome = engine.execute(pipeline, &push_trigger(), selection).await?;
    let events = events.lock().unwrap().clone();
    Ok(RunResult { outcome, events })
}

/// Run the whole matrix with one mock standing in for every os family
pub async fn run_matrix(pipeline: &Pipeline, runner: Arc<MockRunner>) -> RunResult {
    run_with_pool(
        pipeline,
        RunnerPool::uniform(runner),
        SchedulingStrategy::Parallel,
        &MatrixSelection::all(),
    )
    .await
    .unwrap()
}
