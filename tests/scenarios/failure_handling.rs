//! Fail-fast inside a job, isolation between jobs, failure classes

use crate::helpers::*;
use matrixci::core::{FailureKind, StepStatus, Verdict};
use matrixci::execution::ExecutionEvent;
use std::sync::Arc;

#[tokio::test]
async fn test_compile_failure_skips_remaining_steps() {
    let runner = Arc::new(MockRunner::new().fail("linux-1.44.0", "cargo check", 101));
    let result = run_matrix(&builtin_pipeline(), runner.clone()).await;

    let commands = runner.commands_for("linux-1.44.0");
    assert_eq!(commands.last().map(String::as_str), Some("cargo check"));
    assert!(!commands.iter().any(|c| c.starts_with("cargo test")));
    assert!(!commands.iter().any(|c| c.starts_with("cargo clippy")));

    let job = result.outcome.job("linux-1.44.0").unwrap();
    assert_eq!(job.failure.as_ref().unwrap().kind, FailureKind::Compile);

    let statuses: Vec<(&str, StepStatus)> = job
        .steps
        .iter()
        .map(|step| (step.step_id.as_str(), step.status))
        .collect();
    assert_eq!(
        statuses,
        [
            ("checkout", StepStatus::Passed),
            ("toolchain", StepStatus::Passed),
            ("clippy-component", StepStatus::Passed),
            ("dbus-headers", StepStatus::Passed),
            ("check", StepStatus::Failed),
            ("test-no-run", StepStatus::Skipped),
            ("test-images-no-run", StepStatus::Skipped),
            ("clippy", StepStatus::Skipped),
        ]
    );

    let skipped: Vec<&str> = result
        .events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::StepSkipped { job_id, step_id, .. } if job_id == "linux-1.44.0" => {
                Some(step_id.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(skipped, ["test-no-run", "test-images-no-run", "clippy"]);

    // the other linux job ran to the end
    let sibling = runner.commands_for("linux-stable");
    assert_eq!(sibling.last().map(String::as_str), Some("cargo clippy -- -D warnings"));
}

#[tokio::test]
async fn test_unavailable_toolchain_fails_only_its_jobs() {
    let runner = Arc::new(MockRunner::new().fail_everywhere("rustup toolchain install 1.44.0", 1));
    let result = run_matrix(&builtin_pipeline(), runner.clone()).await;

    assert_eq!(result.outcome.verdict, Verdict::Fail);
    assert_eq!(
        result.failed_job_ids(),
        ["linux-1.44.0", "windows-1.44.0", "macos-1.44.0"]
    );
    for job in result.outcome.failed_jobs() {
        let failure = job.failure.as_ref().unwrap();
        assert_eq!(failure.step_id, "toolchain");
        assert_eq!(failure.kind, FailureKind::Provisioning);
        assert!(!runner.commands_for(&job.job_id).iter().any(|c| c.starts_with("cargo")));
    }
    for job_id in ["linux-stable", "windows-stable", "macos-stable"] {
        assert!(result.outcome.job(job_id).unwrap().is_pass());
    }
}

#[tokio::test]
async fn test_native_dependency_failure_is_provisioning() {
    let runner = Arc::new(MockRunner::new().fail("linux-stable", "apt-get install", 100));
    let result = run_matrix(&builtin_pipeline(), runner).await;

    assert_eq!(result.failed_job_ids(), ["linux-stable"]);
    let failure = result.outcome.job("linux-stable").unwrap().failure.clone().unwrap();
    assert_eq!(failure.step_id, "dbus-headers");
    assert_eq!(failure.kind, FailureKind::Provisioning);
    assert_eq!(failure.exit_code, Some(100));
}

#[tokio::test]
async fn test_continue_on_error_step_records_failure_but_job_passes() {
    let yaml = r#"
name: "advisory"
on: [push]
matrix:
  os: [linux, windows]
  toolchain: ["stable"]
steps:
  - id: audit
    run: "cargo audit"
    continue_on_error: true
  - id: check
    run: "cargo check"
"#;
    let runner = Arc::new(MockRunner::new().fail_everywhere("cargo audit", 1));
    let result = run_matrix(&pipeline_from_yaml(yaml), runner.clone()).await;

    assert_eq!(result.outcome.verdict, Verdict::Pass);
    for job in &result.outcome.jobs {
        assert!(job.failure.is_none());
        assert_eq!(job.steps[0].status, StepStatus::FailedContinued);
        assert_eq!(job.steps[1].status, StepStatus::Passed);
        assert_eq!(runner.commands_for(&job.job_id), ["cargo audit", "cargo check"]);
    }

    let continued = result
        .events
        .iter()
        .filter(|event| matches!(event, ExecutionEvent::StepFailed { continued: true, .. }))
        .count();
    assert_eq!(continued, 2);
}
