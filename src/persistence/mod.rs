//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{PipelineOutcome, PipelineTrigger, Verdict};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one gated push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Trigger that started the run
    pub trigger_id: Uuid,

    pub pipeline_name: String,

    /// Pushed ref and commit
    pub git_ref: String,
    pub sha: String,

    /// Aggregate verdict
    pub status: Verdict,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub jobs_passed: usize,
    pub jobs_total: usize,

    /// Ids of the jobs that failed
    pub failed_jobs: Vec<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by trigger id
    async fn load_run(&self, trigger_id: Uuid) -> Result<Option<RunSummary>>;

    /// All runs of a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;

    /// Most recent run of a pipeline
    async fn latest_run(&self, pipeline_name: &str) -> Result<Option<RunSummary>> {
        Ok(self.list_runs(pipeline_name).await?.into_iter().next())
    }
}

/// In-memory persistence (for testing or `--no-history` runs)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
    by_pipeline: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        let replaced = runs.insert(run.trigger_id, run.clone()).is_some();

        if !replaced {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(run.pipeline_name.clone())
                .or_default()
                .push(run.trigger_id);
        }

        Ok(())
    }

    async fn load_run(&self, trigger_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&trigger_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<RunSummary> = by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(outcome: &PipelineOutcome, trigger: &PipelineTrigger) -> RunSummary {
    RunSummary {
        trigger_id: outcome.trigger_id,
        pipeline_name: outcome.pipeline_name.clone(),
        git_ref: trigger.git_ref.clone(),
        sha: trigger.sha.clone(),
        status: outcome.verdict,
        started_at: outcome.started_at,
        completed_at: outcome.completed_at,
        jobs_passed: outcome.passed_jobs(),
        jobs_total: outcome.jobs.len(),
        failed_jobs: outcome
            .jobs
            .iter()
            .filter(|job| !job.is_pass())
            .map(|job| job.job_id.clone())
            .collect(),
    }
}
