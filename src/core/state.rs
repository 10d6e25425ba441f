//! Execution state models

use crate::core::matrix::{OsFamily, ToolchainVersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a job or a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Not started yet
    Pending,
    /// Currently running
    Running,
    /// Finished and every gate passed
    Passed,
    /// Finished and at least one gate failed
    Failed,
}

impl From<Verdict> for ExecutionStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => ExecutionStatus::Passed,
            Verdict::Fail => ExecutionStatus::Failed,
        }
    }
}

/// Binary result exposed for jobs and runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("pass"),
            Verdict::Fail => f.write_str("fail"),
        }
    }
}

/// Failure classes a step can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Checkout, toolchain, component or native dependency install failed
    Provisioning,
    /// Compile-check or test compilation reported errors
    Compile,
    /// Linter reported a diagnostic under warnings-as-errors
    Lint,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Provisioning => f.write_str("provisioning failure"),
            FailureKind::Compile => f.write_str("compile failure"),
            FailureKind::Lint => f.write_str("lint violation"),
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Waiting for its predecessor
    Pending,
    /// Command is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Every command of the step exited zero
    Passed {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// A command exited non-zero, timed out or could not be spawned
    Failed {
        error: String,
        exit_code: Option<i32>,
        output: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Never ran because an earlier step failed
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Passed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Whether the step's command was actually started
    pub fn was_executed(&self) -> bool {
        matches!(
            self,
            StepState::Running { .. } | StepState::Passed { .. } | StepState::Failed { .. }
        )
    }
}

/// The step that failed a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step_id: String,
    pub step_name: String,
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    pub error: String,
    /// Tail of the captured stdout/stderr
    pub output: String,
}

/// Per-step line of a job report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub name: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Failed, but the step allows the job to continue
    FailedContinued,
    Skipped,
    NotRun,
}

/// Outcome of one platform job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub os: OsFamily,
    pub toolchain: ToolchainVersion,
    pub verdict: Verdict,
    pub failure: Option<StepFailure>,
    pub steps: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass()
    }
}

/// Outcome of a whole run, reported against the triggering push
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub trigger_id: Uuid,
    pub pipeline_name: String,
    pub verdict: Verdict,
    pub jobs: Vec<JobOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PipelineOutcome {
    pub fn is_pass(&self) -> bool {
        self.verdict.is_pass()
    }

    pub fn passed_jobs(&self) -> usize {
        self.jobs.iter().filter(|j| j.is_pass()).count()
    }

    pub fn failed_jobs(&self) -> Vec<&JobOutcome> {
        self.jobs.iter().filter(|j| !j.is_pass()).collect()
    }

    pub fn job(&self, job_id: &str) -> Option<&JobOutcome> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }
}
