//! Runner availability, matrix narrowing and scheduling limits

use crate::helpers::*;
use matrixci::core::{FailureKind, MatrixSelection, OsFamily, ToolchainVersion, Verdict};
use matrixci::execution::{ExecutionEvent, SchedulingStrategy};
use matrixci::runner::RunnerPool;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_missing_runner_is_a_provisioning_failure() {
    let runner = Arc::new(MockRunner::new());
    let mut pool = RunnerPool::new();
    pool.insert(OsFamily::Linux, runner.clone());

    let result = run_with_pool(
        &builtin_pipeline(),
        pool,
        SchedulingStrategy::Parallel,
        &MatrixSelection::all(),
    )
    .await
    .unwrap();

    assert_eq!(result.outcome.verdict, Verdict::Fail);
    assert_eq!(result.outcome.jobs.len(), 6);
    assert_eq!(
        result.failed_job_ids(),
        ["windows-stable", "windows-1.44.0", "macos-stable", "macos-1.44.0"]
    );
    for job in result.outcome.failed_jobs() {
        let failure = job.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Provisioning);
        assert!(failure.error.contains("No runner available"));
        assert!(runner.commands_for(&job.job_id).is_empty());
    }
}

#[tokio::test]
async fn test_selection_narrows_before_the_gate() {
    let runner = Arc::new(MockRunner::new());
    let mut pool = RunnerPool::new();
    pool.insert(OsFamily::Linux, runner.clone());
    let selection = MatrixSelection {
        os: vec![OsFamily::Linux],
        toolchain: vec![],
    };

    let result = run_with_pool(&builtin_pipeline(), pool, SchedulingStrategy::Parallel, &selection)
        .await
        .unwrap();

    assert_eq!(result.outcome.verdict, Verdict::Pass);
    assert_eq!(result.outcome.jobs.len(), 2);
    assert!(matches!(
        result.events.first(),
        Some(ExecutionEvent::PipelineStarted { total_jobs: 6, selected_jobs: 2, .. })
    ));
}

#[tokio::test]
async fn test_toolchain_selection() {
    let runner = Arc::new(MockRunner::new());
    let selection = MatrixSelection {
        os: vec![],
        toolchain: vec![ToolchainVersion::new("1.44.0")],
    };

    let result = run_with_pool(
        &builtin_pipeline(),
        RunnerPool::uniform(runner),
        SchedulingStrategy::Parallel,
        &selection,
    )
    .await
    .unwrap();

    let ids: Vec<&str> = result.outcome.jobs.iter().map(|job| job.job_id.as_str()).collect();
    assert_eq!(ids, ["linux-1.44.0", "windows-1.44.0", "macos-1.44.0"]);
}

#[tokio::test]
async fn test_empty_selection_is_an_error() {
    let selection = MatrixSelection {
        os: vec![],
        toolchain: vec![ToolchainVersion::new("nightly")],
    };

    let result = run_with_pool(
        &builtin_pipeline(),
        RunnerPool::uniform(Arc::new(MockRunner::new())),
        SchedulingStrategy::Parallel,
        &selection,
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_sequential_strategy_runs_one_job_at_a_time() {
    let runner = Arc::new(MockRunner::new().with_delay(Duration::from_millis(5)));

    let result = run_with_pool(
        &builtin_pipeline(),
        RunnerPool::uniform(runner.clone()),
        SchedulingStrategy::Sequential,
        &MatrixSelection::all(),
    )
    .await
    .unwrap();

    assert!(result.outcome.is_pass());
    assert_eq!(runner.peak_concurrency(), 1);
}

#[tokio::test]
async fn test_limited_parallel_caps_concurrency() {
    let runner = Arc::new(MockRunner::new().with_delay(Duration::from_millis(20)));

    let result = run_with_pool(
        &builtin_pipeline(),
        RunnerPool::uniform(runner.clone()),
        SchedulingStrategy::LimitedParallel(2),
        &MatrixSelection::all(),
    )
    .await
    .unwrap();

    assert!(result.outcome.is_pass());
    assert!(runner.peak_concurrency() <= 2, "peak {}", runner.peak_concurrency());
}
