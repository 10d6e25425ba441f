//! Platform job: one matrix cell's ordered step list

use crate::core::{
    matrix::{MatrixCell, OsFamily, ToolchainVersion},
    state::{ExecutionStatus, JobOutcome, StepFailure, StepResult, StepState, StepStatus, Verdict},
    step::Step,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A job instance: one (os, toolchain) pair and its steps
#[derive(Debug, Clone)]
pub struct PlatformJob {
    pub id: String,
    pub os: OsFamily,
    pub toolchain: ToolchainVersion,

    /// Steps in execution order
    pub steps: Vec<Step>,

    pub status: ExecutionStatus,

    /// The failure that ended the job, if any
    pub failure: Option<StepFailure>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlatformJob {
    /// Instantiate the step template for one matrix cell.
    ///
    /// Steps restricted to other families are dropped; the rest keep their
    /// declared order.
    pub fn from_cell(cell: &MatrixCell, template: &[Step], variables: &HashMap<String, String>) -> Self {
        let steps = template
            .iter()
            .filter(|step| step.applies_to(cell.os))
            .map(|step| step.instantiate(variables))
            .collect();

        Self {
            id: cell.id(),
            os: cell.os,
            toolchain: cell.toolchain.clone(),
            steps,
            status: ExecutionStatus::Pending,
            failure: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn start(&mut self) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Close the job: skip whatever has not run and settle the verdict
    pub fn finish(&mut self) {
        for step in &mut self.steps {
            if !step.state.is_terminal() {
                step.state = StepState::Skipped {
                    reason: match &self.failure {
                        Some(failure) => format!("'{}' failed", failure.step_id),
                        None => "job ended early".to_string(),
                    },
                };
            }
        }
        self.status = if self.failure.is_some() {
            ExecutionStatus::Failed
        } else {
            ExecutionStatus::Passed
        };
        self.completed_at = Some(Utc::now());
    }

    /// Fail the job before any step runs (e.g. no environment available)
    pub fn reject(&mut self, failure: StepFailure) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.failure = Some(failure);
        self.finish();
    }

    pub fn verdict(&self) -> Verdict {
        if self.failure.is_some() {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    pub fn outcome(&self) -> JobOutcome {
        let now = Utc::now();
        let steps = self
            .steps
            .iter()
            .map(|step| {
                let (status, exit_code, duration_ms) = match &step.state {
                    StepState::Passed { started_at, completed_at, .. } => (
                        StepStatus::Passed,
                        Some(0),
                        Some(elapsed_ms(*started_at, *completed_at)),
                    ),
                    StepState::Failed { exit_code, started_at, failed_at, .. } => (
                        if step.continue_on_failure {
                            StepStatus::FailedContinued
                        } else {
                            StepStatus::Failed
                        },
                        *exit_code,
                        Some(elapsed_ms(*started_at, *failed_at)),
                    ),
                    StepState::Skipped { .. } => (StepStatus::Skipped, None, None),
                    StepState::Pending | StepState::Running { .. } => (StepStatus::NotRun, None, None),
                };
                StepResult {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    status,
                    exit_code,
                    duration_ms,
                }
            })
            .collect();

        JobOutcome {
            job_id: self.id.clone(),
            os: self.os,
            toolchain: self.toolchain.clone(),
            verdict: self.verdict(),
            failure: self.failure.clone(),
            steps,
            started_at: self.started_at.unwrap_or(now),
            completed_at: self.completed_at.unwrap_or(now),
        }
    }
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    to.signed_duration_since(from).num_milliseconds().max(0) as u64
}
