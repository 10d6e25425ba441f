use anyhow::{Context, Result};
use matrixci::cli::commands::{
    HistoryCommand, HookAction, HookCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand,
};
use matrixci::cli::output::*;
use matrixci::cli::{hook, Cli, Command};
use matrixci::core::config::PipelineConfig;
use matrixci::core::{Pipeline, PipelineTrigger};
use matrixci::execution::{ExecutionEngine, ExecutionEvent, RunSettings, StepExecutor};
use matrixci::persistence::{create_summary, InMemoryPersistence, PersistenceBackend, RunSummary};
use matrixci::runner::{ProcessRunner, RunnerPool};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.verbose).await?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
        Command::Hook(cmd) => manage_hook(cmd)?,
    }

    Ok(())
}

/// Load the named pipeline file, or the built-in one, and apply overrides
fn load_pipeline(file: Option<&Path>, overrides: &[(String, String)], quiet: bool) -> Result<Pipeline> {
    let config = match file {
        Some(path) => PipelineConfig::from_file(path).context("Failed to load pipeline config")?,
        None => PipelineConfig::builtin().context("Built-in pipeline is invalid")?,
    };

    if !quiet {
        println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());
    }

    let mut pipeline = config.to_pipeline();
    for (key, value) in overrides {
        pipeline.variables.insert(key.clone(), value.clone());
        if !quiet {
            println!(
                "{} Variable override: {} = {}",
                INFO,
                style(key).cyan(),
                style(value).dim()
            );
        }
    }

    Ok(pipeline)
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    let store = matrixci::persistence::SqliteRunStore::with_default_path()
        .await
        .context("Failed to open run history")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without the `sqlite` feature; history is kept in memory only");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(cmd.file.as_deref(), &cmd.variable, cmd.json)?;

    let source = cmd
        .source
        .canonicalize()
        .with_context(|| format!("Repository not found: {}", cmd.source.display()))?;
    let trigger = match cmd.pushed_trigger() {
        Some(trigger) => trigger,
        None => PipelineTrigger::from_repository(&ProcessRunner::new(), &source)
            .await
            .context("Failed to resolve the pushed commit")?,
    };

    if !pipeline.trigger_filter()?.accepts(&trigger) {
        println!(
            "{} {} does not run for {}",
            INFO,
            style(&pipeline.name).bold(),
            style(&trigger.git_ref).dim()
        );
        return Ok(());
    }

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let mut settings = RunSettings {
        source,
        ..RunSettings::default()
    };
    if let Some(work_dir) = &cmd.work_dir {
        std::fs::create_dir_all(work_dir)
            .with_context(|| format!("Failed to create {}", work_dir.display()))?;
        settings.work_root = work_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", work_dir.display()))?;
    }

    let pool = RunnerPool::local();
    if pool.families().is_empty() {
        warn!("This host is not a supported runner; every job will fail to provision");
    }

    let mut engine = ExecutionEngine::new(pool, cmd.strategy())
        .with_settings(settings)
        .with_executor(
            StepExecutor::default().with_tail_lines(cmd.output_lines.max(StepExecutor::DEFAULT_TAIL_LINES)),
        );

    let selection = cmd.selection();
    let selected = pipeline.cells().iter().filter(|cell| selection.includes(cell)).count();

    let progress = if cmd.json {
        None
    } else {
        Some(create_progress_bar(selected))
    };
    if let Some(progress) = &progress {
        let progress = progress.clone();
        engine.add_event_handler(move |event| {
            let show = match event {
                ExecutionEvent::StepStarted { .. } | ExecutionEvent::StepPassed { .. } => verbose,
                _ => true,
            };
            if let ExecutionEvent::JobFinished { job_id, .. } = event {
                progress.inc(1);
                progress.set_message(job_id.clone());
            }
            if show {
                progress.println(format_execution_event(event));
            }
        });
    }

    let result = engine.execute(&pipeline, &trigger, &selection).await;
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }
    let outcome = result?;

    let summary = create_summary(&outcome, &trigger);
    store.save_run(&summary).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", format_report(&outcome, cmd.output_lines));
        if !cmd.no_history {
            println!(
                "{} Run saved to history (ID: {})",
                INFO,
                style(&summary.trigger_id.to_string()[..8]).dim()
            );
        }
    }

    if outcome.is_pass() {
        if !cmd.json {
            println!(
                "\n{} {} passed on {} ({})",
                CHECK,
                style(&pipeline.name).bold(),
                trigger.git_ref,
                style(trigger.short_sha()).dim()
            );
        }
    } else {
        if !cmd.json {
            println!(
                "\n{} {} {} on {} ({})",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red(),
                trigger.git_ref,
                style(trigger.short_sha()).dim()
            );
        }
        error!(
            "{} of {} jobs failed",
            outcome.jobs.len() - outcome.passed_jobs(),
            outcome.jobs.len()
        );
        std::process::exit(1);
    }

    Ok(())
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<()> {
    let pipeline = load_pipeline(cmd.file.as_deref(), &cmd.variable, cmd.json)?;
    let settings = RunSettings::default();
    let executor = StepExecutor::default();
    let jobs = pipeline.expand(&settings.source, &settings.work_root);

    if cmd.json {
        let mut data = Vec::new();
        for (job, context) in &jobs {
            let steps: Vec<_> = job
                .steps
                .iter()
                .map(|step| {
                    let commands = executor
                        .commands_for(step, context)
                        .map(|specs| specs.iter().map(|spec| spec.display()).collect::<Vec<_>>());
                    serde_json::json!({
                        "id": step.id,
                        "name": step.name,
                        "failure_kind": step.failure_kind,
                        "continue_on_failure": step.continue_on_failure,
                        "commands": commands.as_ref().ok(),
                        "error": commands.as_ref().err(),
                    })
                })
                .collect();
            data.push(serde_json::json!({
                "id": job.id,
                "os": job.os,
                "toolchain": job.toolchain,
                "steps": steps,
            }));
        }
        let data = serde_json::json!({ "pipeline": pipeline.name, "jobs": data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!(
        "{} {} expands to {} jobs",
        INFO,
        style(&pipeline.name).bold(),
        style(jobs.len()).cyan()
    );
    for (job, context) in &jobs {
        println!("\n{} ({})", style(&job.id).bold(), style(job.os.runner_image()).dim());
        for (index, step) in job.steps.iter().enumerate() {
            let continued = if step.continue_on_failure { " (continue on failure)" } else { "" };
            println!(
                "  {}. {} [{}]{}",
                index + 1,
                step.name,
                format_failure_kind(step.failure_kind),
                continued
            );
            match executor.commands_for(step, context) {
                Ok(specs) => {
                    for spec in specs {
                        println!("       {} {}", style("$").dim(), spec.display());
                    }
                }
                Err(e) => println!("       {} {}", WARN, style(e).red()),
            }
        }
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            for axis in config.matrix.axes() {
                println!("  {}: {}", axis.name, style(axis.values.join(", ")).cyan());
            }
            println!("  Jobs: {}", style(config.matrix.cell_count()).cyan());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Variables: {}", style(pipeline.variables.len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_history().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await?;
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.len(),
                "passed": runs.iter().filter(|r| r.status.is_pass()).count(),
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        if cmd.with_counts {
            let runs = store.list_runs(pipeline_name).await?;
            let passed = runs.iter().filter(|r| r.status.is_pass()).count();
            println!(
                "  {} ({} runs: {} passed, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(passed).green(),
                style(runs.len() - passed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.details)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.pipeline {
        Some(pipeline_name) => store.list_runs(pipeline_name).await?,
        None => {
            let mut all_runs = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all_runs.extend(store.list_runs(&pipeline).await?);
            }
            all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all_runs
        }
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, details: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.trigger_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Ref: {} ({})", summary.git_ref, style(&summary.sha).dim());
    println!("  Status: {}", format_verdict(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Completed: {}", style(summary.completed_at.to_rfc3339()).dim());
    if let Ok(duration) = summary.completed_at.signed_duration_since(summary.started_at).to_std() {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!("  Jobs: {}/{} passed", summary.jobs_passed, summary.jobs_total);
    if !summary.failed_jobs.is_empty() {
        println!("  Failed: {}", style(summary.failed_jobs.join(", ")).red());
    }

    if details {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn manage_hook(cmd: &HookCommand) -> Result<()> {
    match &cmd.action {
        HookAction::Install { repo, run_args, force } => {
            let path = hook::install(repo, run_args, *force)?;
            println!("{} Installed pre-push hook: {}", CHECK, style(path.display()).dim());
        }
        HookAction::Uninstall { repo } => {
            if hook::uninstall(repo)? {
                println!("{} Removed pre-push hook", CHECK);
            } else {
                println!("{} No pre-push hook installed", INFO);
            }
        }
    }
    Ok(())
}
