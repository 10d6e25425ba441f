//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::JobContext,
    job::PlatformJob,
    matrix::{MatrixCell, MatrixConfig},
    step::{Step, StepDefaults},
    trigger::{TriggerEvent, TriggerFilter},
};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// A pipeline definition
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Global variables available to all steps
    pub variables: HashMap<String, String>,

    /// Events that start the pipeline
    pub triggers: Vec<TriggerEvent>,

    /// Branch patterns (empty = all branches)
    pub branches: Vec<String>,

    /// Matrix axes
    pub matrix: MatrixConfig,

    /// Step template shared by every job
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = StepDefaults {
            timeout_secs: config.default_timeout_secs,
        };

        Pipeline {
            name: config.name.clone(),
            variables: config.variables_as_string_map(),
            triggers: config.triggers.clone(),
            branches: config.branches.clone(),
            matrix: config.matrix.clone(),
            steps: config
                .steps
                .iter()
                .map(|step_config| Step::from_config(step_config, &defaults))
                .collect(),
        }
    }

    pub fn trigger_filter(&self) -> Result<TriggerFilter> {
        TriggerFilter::new(self.triggers.clone(), &self.branches)
    }

    /// Every matrix cell, in deterministic order
    pub fn cells(&self) -> Vec<MatrixCell> {
        self.matrix.expand()
    }

    /// Context for a cell's job
    pub fn context_for(&self, cell: &MatrixCell, source: &Path, work_root: &Path) -> JobContext {
        JobContext::new(cell, source, work_root).with_variables(&self.variables)
    }

    /// Instantiate the job for one cell
    pub fn job_for(&self, cell: &MatrixCell, context: &JobContext) -> PlatformJob {
        PlatformJob::from_cell(cell, &self.steps, &context.rendering_variables())
    }

    /// Matrix expansion: one job (with its context) per cell
    pub fn expand(&self, source: &Path, work_root: &Path) -> Vec<(PlatformJob, JobContext)> {
        self.cells()
            .iter()
            .map(|cell| {
                let context = self.context_for(cell, source, work_root);
                (self.job_for(cell, &context), context)
            })
            .collect()
    }
}
