//! Every (os, toolchain) pair becomes exactly one job with its family's steps

use crate::helpers::*;
use std::collections::HashSet;
use std::sync::Arc;

const JOB_IDS: [&str; 6] = [
    "linux-stable",
    "linux-1.44.0",
    "windows-stable",
    "windows-1.44.0",
    "macos-stable",
    "macos-1.44.0",
];

#[tokio::test]
async fn test_push_runs_one_job_per_matrix_cell() {
    let runner = Arc::new(MockRunner::new());
    let result = run_matrix(&builtin_pipeline(), runner.clone()).await;

    let ids: Vec<&str> = result.outcome.jobs.iter().map(|job| job.job_id.as_str()).collect();
    assert_eq!(ids, JOB_IDS);

    let unique: HashSet<_> = result
        .outcome
        .jobs
        .iter()
        .map(|job| (job.os, job.toolchain.clone()))
        .collect();
    assert_eq!(unique.len(), 6);

    for id in JOB_IDS {
        assert!(!runner.commands_for(id).is_empty(), "{} never ran", id);
    }
}

#[tokio::test]
async fn test_linux_jobs_install_native_deps_and_build_images() {
    let runner = Arc::new(MockRunner::new());
    run_matrix(&builtin_pipeline(), runner.clone()).await;

    for toolchain in ["stable", "1.44.0"] {
        let linux = runner.commands_for(&format!("linux-{}", toolchain));
        assert!(linux.contains(&"sudo apt-get install -y libdbus-1-dev".to_string()));
        assert!(linux.contains(&"cargo test --no-run --features images".to_string()));

        for os in ["windows", "macos"] {
            let other = runner.commands_for(&format!("{}-{}", os, toolchain));
            assert!(!other.iter().any(|c| c.contains("apt-get")), "{:?}", other);
            assert!(!other.iter().any(|c| c.contains("--features images")), "{:?}", other);
        }
    }
}

#[tokio::test]
async fn test_steps_run_in_declared_order() {
    let runner = Arc::new(MockRunner::new());
    run_matrix(&builtin_pipeline(), runner.clone()).await;

    let commands = runner.commands_for("windows-1.44.0");
    assert!(commands[0].starts_with("git clone"));
    assert!(commands[1].starts_with("git checkout --quiet --detach"));
    assert_eq!(
        &commands[2..],
        [
            "rustup toolchain install 1.44.0 --profile minimal --no-self-update",
            "rustup override set 1.44.0",
            "rustup component add clippy --toolchain 1.44.0",
            "cargo check",
            "cargo test --no-run",
            "cargo clippy -- -D warnings",
        ]
    );
}

#[tokio::test]
async fn test_every_lint_step_denies_warnings() {
    let runner = Arc::new(MockRunner::new());
    run_matrix(&builtin_pipeline(), runner.clone()).await;

    for id in JOB_IDS {
        let commands = runner.commands_for(id);
        assert_eq!(commands.last().map(String::as_str), Some("cargo clippy -- -D warnings"));
    }
}

#[tokio::test]
async fn test_variables_are_rendered_per_job() {
    let yaml = r#"
name: "rendered"
on: [push]
matrix:
  os: [linux, macos]
  toolchain: ["stable"]
variables:
  features: "images"
steps:
  - id: build
    run: "cargo build --features {{ features }} --target-dir target/{{ os }}-{{ toolchain }}"
"#;
    let runner = Arc::new(MockRunner::new());
    run_matrix(&pipeline_from_yaml(yaml), runner.clone()).await;

    assert_eq!(
        runner.commands_for("linux-stable"),
        ["cargo build --features images --target-dir target/linux-stable"]
    );
    assert_eq!(
        runner.commands_for("macos-stable"),
        ["cargo build --features images --target-dir target/macos-stable"]
    );
}
