//! The push passes only when every job passes

use crate::helpers::*;
use matrixci::core::{FailureKind, Verdict};
use matrixci::execution::ExecutionEvent;
use std::sync::Arc;

#[tokio::test]
async fn test_all_jobs_pass_gate_passes() {
    let result = run_matrix(&builtin_pipeline(), Arc::new(MockRunner::new())).await;

    assert_eq!(result.outcome.verdict, Verdict::Pass);
    assert_eq!(result.outcome.passed_jobs(), 6);
    assert!(result.failed_job_ids().is_empty());

    let finished = result
        .events
        .iter()
        .filter(|event| matches!(event, ExecutionEvent::JobFinished { .. }))
        .count();
    assert_eq!(finished, 6);
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::PipelineFinished { verdict: Verdict::Pass, .. })
    ));
}

#[tokio::test]
async fn test_lint_failure_on_one_job_fails_the_push() {
    let runner = Arc::new(MockRunner::new().fail("windows-stable", "cargo clippy", 101));
    let result = run_matrix(&builtin_pipeline(), runner).await;

    assert_eq!(result.outcome.verdict, Verdict::Fail);
    assert_eq!(result.failed_job_ids(), ["windows-stable"]);
    assert_eq!(result.outcome.passed_jobs(), 5);

    let job = result.outcome.job("windows-stable").unwrap();
    let failure = job.failure.as_ref().unwrap();
    assert_eq!(failure.step_id, "clippy");
    assert_eq!(failure.kind, FailureKind::Lint);
    assert_eq!(failure.exit_code, Some(101));
    assert!(failure.output.contains("cargo clippy -- -D warnings"));

    // the sibling on the same os with the other toolchain is untouched
    assert!(result.outcome.job("windows-1.44.0").unwrap().is_pass());
}

#[tokio::test]
async fn test_any_single_failing_job_flips_the_verdict() {
    for job_id in [
        "linux-stable",
        "linux-1.44.0",
        "windows-stable",
        "windows-1.44.0",
        "macos-stable",
        "macos-1.44.0",
    ] {
        let runner = Arc::new(MockRunner::new().fail(job_id, "cargo check", 101));
        let result = run_matrix(&builtin_pipeline(), runner).await;

        assert_eq!(result.outcome.verdict, Verdict::Fail, "{} failing", job_id);
        assert_eq!(result.failed_job_ids(), [job_id]);
    }
}

#[tokio::test]
async fn test_every_job_failing_still_reports_every_job() {
    let runner = Arc::new(MockRunner::new().fail_everywhere("cargo check", 101));
    let result = run_matrix(&builtin_pipeline(), runner).await;

    assert_eq!(result.outcome.verdict, Verdict::Fail);
    assert_eq!(result.outcome.jobs.len(), 6);
    assert_eq!(result.outcome.passed_jobs(), 0);
    for job in &result.outcome.jobs {
        assert_eq!(job.failure.as_ref().unwrap().kind, FailureKind::Compile);
    }
}
