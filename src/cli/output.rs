//! CLI output formatting

use crate::{
    core::{FailureKind, JobOutcome, PipelineOutcome, StepStatus, Verdict},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Progress bar over the jobs of a run
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} jobs {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule sized to the terminal
pub fn separator() -> String {
    let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(80).min(100);
    style("─".repeat(width)).dim().to_string()
}

pub fn format_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => style("PASS").green().bold().to_string(),
        Verdict::Fail => style("FAIL").red().bold().to_string(),
    }
}

pub fn format_failure_kind(kind: FailureKind) -> String {
    match kind {
        FailureKind::Provisioning => style(kind).magenta().to_string(),
        FailureKind::Compile => style(kind).red().to_string(),
        FailureKind::Lint => style(kind).yellow().to_string(),
    }
}

fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Passed => style("passed").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::FailedContinued => style("failed (continued)").yellow().to_string(),
        StepStatus::Skipped => style("skipped").dim().to_string(),
        StepStatus::NotRun => style("not run").dim().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            trigger_id,
            pipeline_name,
            total_jobs,
            selected_jobs,
        } => {
            let scope = if selected_jobs == total_jobs {
                format!("{} jobs", total_jobs)
            } else {
                format!("{} of {} jobs selected", selected_jobs, total_jobs)
            };
            format!(
                "{} Starting pipeline {} ({}): {}",
                ROCKET,
                style(pipeline_name).bold(),
                style(&trigger_id.to_string()[..8]).dim(),
                scope
            )
        }
        ExecutionEvent::JobStarted { job_id, .. } => {
            format!("{} {} started", SPINNER, style(job_id).cyan())
        }
        ExecutionEvent::StepStarted { job_id, name, .. } => {
            format!("  {} {}", style(format!("[{}]", job_id)).dim(), name)
        }
        ExecutionEvent::StepPassed { job_id, step_id } => {
            format!("  {} {}{}", style(format!("[{}]", job_id)).dim(), CHECK, style(step_id).green())
        }
        ExecutionEvent::StepFailed {
            job_id,
            step_id,
            kind,
            error,
            continued,
        } => {
            let icon = if *continued { WARN } else { CROSS };
            let suffix = if *continued { " (continuing)" } else { "" };
            format!(
                "  {} {}{} {}: {}{}",
                style(format!("[{}]", job_id)).dim(),
                icon,
                style(step_id).red(),
                format_failure_kind(*kind),
                style(error).dim(),
                suffix
            )
        }
        ExecutionEvent::StepSkipped { job_id, step_id, reason } => format!(
            "  {} {} skipped ({})",
            style(format!("[{}]", job_id)).dim(),
            style(step_id).dim(),
            reason
        ),
        ExecutionEvent::JobFinished { job_id, verdict, failure } => match failure {
            Some(failure) => format!(
                "{} {} {} at '{}' ({})",
                CROSS,
                style(job_id).bold(),
                format_verdict(*verdict),
                failure.step_id,
                format_failure_kind(failure.kind)
            ),
            None => format!("{} {} {}", CHECK, style(job_id).bold(), format_verdict(*verdict)),
        },
        ExecutionEvent::PipelineFinished { trigger_id, verdict } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&trigger_id.to_string()[..8]).dim(),
            format_verdict(*verdict)
        ),
    }
}

/// One line per job: verdict, id, duration
pub fn format_job_line(job: &JobOutcome) -> String {
    let icon = if job.is_pass() { CHECK } else { CROSS };
    let duration = job
        .completed_at
        .signed_duration_since(job.started_at)
        .to_std()
        .unwrap_or_default();
    format!(
        "{}{:<20} {} {}",
        icon,
        job.job_id,
        format_verdict(job.verdict),
        style(format_duration(duration)).dim()
    )
}

/// Final report for a run. Failing jobs list their steps, the failing
/// step's class and exit code, and the tail of its output.
pub fn format_report(outcome: &PipelineOutcome, max_output_lines: usize) -> String {
    let mut lines = vec![separator()];
    lines.push(format!(
        "{} {}: {} ({}/{} jobs passed)",
        INFO,
        style(&outcome.pipeline_name).bold(),
        format_verdict(outcome.verdict),
        outcome.passed_jobs(),
        outcome.jobs.len()
    ));

    for job in &outcome.jobs {
        lines.push(format!("  {}", format_job_line(job)));
    }

    for job in outcome.failed_jobs() {
        lines.push(String::new());
        lines.push(format!("{} {}", CROSS, style(&job.job_id).bold().red()));
        for step in &job.steps {
            let exit = step
                .exit_code
                .map(|code| format!(" (exit {})", code))
                .unwrap_or_default();
            lines.push(format!("    {:<24} {}{}", step.step_id, format_step_status(step.status), exit));
        }
        if let Some(failure) = &job.failure {
            lines.push(format!(
                "  {} '{}' {}: {}",
                WARN,
                failure.step_name,
                format_failure_kind(failure.kind),
                failure.error
            ));
            if max_output_lines > 0 && !failure.output.trim().is_empty() {
                for line in format_output(&failure.output, max_output_lines).lines() {
                    lines.push(format!("    {}", style(line).dim()));
                }
            }
        }
    }

    lines.push(separator());
    lines.join("\n")
}

/// Format a history entry for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = if summary.status.is_pass() { CHECK } else { CROSS };
    let sha = summary.sha.get(..8).unwrap_or(&summary.sha);

    format!(
        "{} {} - {} - {} {} - {} ({}/{})",
        status_icon,
        style(&summary.trigger_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        summary.git_ref,
        style(sha).dim(),
        format_verdict(summary.status),
        summary.jobs_passed,
        summary.jobs_total
    )
}

/// Keep the last `max_lines` lines of step output
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let kept = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{} ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            kept
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
