//! Job working directories: where they live and who owns them

use crate::helpers::*;
use matrixci::core::{MatrixSelection, Verdict};
use matrixci::execution::{RunSettings, SchedulingStrategy};
use matrixci::runner::RunnerPool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn marker_pipeline(tag: &str) -> matrixci::core::Pipeline {
    pipeline_from_yaml(&format!(
        r#"
name: "marker"
on: [push]
matrix:
  os: [linux, macos]
  toolchain: ["stable"]
variables:
  tag: "{tag}"
steps:
  - id: mark
    run: "mark {{{{ tag }}}}-{{{{ job }}}}"
"#,
        tag = tag
    ))
}

#[tokio::test]
async fn test_relative_work_root_keeps_every_command_in_its_job_dir() {
    let runner = Arc::new(MockRunner::new());
    let work_root = PathBuf::from(format!("target/matrixci-relative-{}", uuid::Uuid::new_v4()));
    let settings = RunSettings {
        source: PathBuf::from("/src/repo"),
        work_root: work_root.clone(),
    };

    let result = run_with_settings(
        &builtin_pipeline(),
        RunnerPool::uniform(runner.clone()),
        SchedulingStrategy::Parallel,
        &MatrixSelection::all(),
        settings,
    )
    .await;
    let _ = std::fs::remove_dir_all(&work_root);
    assert_eq!(result.unwrap().outcome.verdict, Verdict::Pass);

    let anchored = std::env::current_dir().unwrap().join(&work_root);
    let calls = runner.calls();
    assert!(!calls.is_empty());
    for call in &calls {
        let cwd = call.cwd.as_ref().unwrap();
        assert!(cwd.is_absolute(), "`{}` ran in {}", call.command, cwd.display());
        assert!(cwd.starts_with(&anchored), "`{}` ran in {}", call.command, cwd.display());
        assert!(cwd.ends_with(&call.job_id));
    }

    let clones: Vec<_> = calls.iter().filter(|call| call.command.starts_with("git clone")).collect();
    assert_eq!(clones.len(), 6);
    for clone in clones {
        assert!(clone.command.ends_with("/src/repo ."), "{}", clone.command);
    }
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_job_dirs() {
    let work_root = std::env::temp_dir().join(format!("matrixci-shared-{}", uuid::Uuid::new_v4()));
    let settings = || RunSettings {
        source: PathBuf::from("/src/repo"),
        work_root: work_root.clone(),
    };
    let pool = || RunnerPool::uniform(Arc::new(MarkerRunner::new(Duration::from_millis(50))));
    let (first, second) = (marker_pipeline("first"), marker_pipeline("second"));

    let selection = MatrixSelection::all();
    let (a, b) = tokio::join!(
        run_with_settings(&first, pool(), SchedulingStrategy::Parallel, &selection, settings()),
        run_with_settings(&second, pool(), SchedulingStrategy::Parallel, &selection, settings()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    for result in [&a, &b] {
        for job in result.outcome.failed_jobs() {
            panic!("{} failed: {:?}", job.job_id, job.failure);
        }
        assert_eq!(result.outcome.verdict, Verdict::Pass);
    }

    // each run removes its own directory once its jobs are done
    let leftovers: Vec<_> = std::fs::read_dir(&work_root)
        .map(|entries| entries.filter_map(Result::ok).map(|entry| entry.path()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
    let _ = std::fs::remove_dir_all(&work_root);
}
