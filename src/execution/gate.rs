//! Gate aggregator - reduces job outcomes to the run's pass/fail

use crate::core::{JobOutcome, PipelineOutcome, PipelineTrigger, Verdict};
use chrono::{DateTime, Utc};

/// Pass iff there is at least one outcome and every outcome passed
pub fn aggregate(outcomes: &[JobOutcome]) -> Verdict {
    if !outcomes.is_empty() && outcomes.iter().all(JobOutcome::is_pass) {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Collects one outcome per expanded job
#[derive(Debug)]
pub struct GateAggregator {
    expected: usize,
    outcomes: Vec<JobOutcome>,
    started_at: DateTime<Utc>,
}

impl GateAggregator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            outcomes: Vec::with_capacity(expected),
            started_at: Utc::now(),
        }
    }

    pub fn collect(&mut self, outcome: JobOutcome) {
        self.outcomes.push(outcome);
    }

    /// A job that never reported counts as failed
    pub fn verdict(&self) -> Verdict {
        if self.outcomes.len() != self.expected {
            return Verdict::Fail;
        }
        aggregate(&self.outcomes)
    }

    pub fn finish(self, trigger: &PipelineTrigger, pipeline_name: &str) -> PipelineOutcome {
        PipelineOutcome {
            trigger_id: trigger.id,
            pipeline_name: pipeline_name.to_string(),
            verdict: self.verdict(),
            jobs: self.outcomes,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}
