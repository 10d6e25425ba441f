//! Pipeline configuration from YAML

use crate::core::{
    matrix::{MatrixConfig, OsFamily},
    state::FailureKind,
    trigger::TriggerEvent,
    Pipeline,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

/// The pipeline that ships with the binary: check, test-compile and lint a
/// Rust package on every push across linux/windows/macos × stable/1.44.0.
pub const BUILTIN_PIPELINE: &str = include_str!("../../pipelines/rust-ci.yml");

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Events that start the pipeline
    #[serde(rename = "on", default = "default_triggers")]
    pub triggers: Vec<TriggerEvent>,

    /// Branch filter (empty = every branch)
    #[serde(default)]
    pub branches: Vec<String>,

    /// Matrix axes
    pub matrix: MatrixConfig,

    /// Variables available to `{{ }}` placeholders
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Default timeout for step commands (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Step template shared by every job
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Built-in action (omit for `run` steps)
    #[serde(default)]
    pub uses: Option<ActionKind>,

    /// Inputs for built-in actions
    #[serde(default)]
    pub with: ActionInputs,

    /// Command line for `run` steps
    #[serde(default)]
    pub run: Option<String>,

    /// Failure class override
    #[serde(default)]
    pub kind: Option<FailureKind>,

    /// Restrict the step to these families
    #[serde(default)]
    pub os: Vec<OsFamily>,

    /// Record a failure without failing the job
    #[serde(default)]
    pub continue_on_error: bool,

    /// Promote linter warnings to errors
    #[serde(default)]
    pub deny_warnings: bool,

    /// Timeout for this step (overrides the pipeline default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Built-in step actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Checkout,
    Toolchain,
    Component,
    Run,
}

/// Inputs for built-in actions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionInputs {
    /// Select the installed toolchain as the default for the job
    #[serde(rename = "override", default = "default_true")]
    pub override_default: bool,

    /// Component name for `component` steps
    #[serde(default)]
    pub component: Option<String>,
}

impl Default for ActionInputs {
    fn default() -> Self {
        Self {
            override_default: true,
            component: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_triggers() -> Vec<TriggerEvent> {
    vec![TriggerEvent::Push]
}

impl StepConfig {
    /// The action this step performs; a bare `run:` implies `uses: run`
    pub fn action_kind(&self) -> ActionKind {
        self.uses.unwrap_or(ActionKind::Run)
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded default pipeline
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_PIPELINE).context("Built-in pipeline is invalid")
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.triggers.is_empty() {
            anyhow::bail!("Pipeline '{}' declares no trigger events", self.name);
        }

        if self.matrix.os.is_empty() {
            anyhow::bail!("Matrix axis 'os' must have at least one value");
        }
        if self.matrix.toolchain.is_empty() {
            anyhow::bail!("Matrix axis 'toolchain' must have at least one value");
        }

        let mut seen_os = HashSet::new();
        for os in &self.matrix.os {
            if !seen_os.insert(os) {
                anyhow::bail!("Duplicate value '{}' on matrix axis 'os'", os);
            }
        }
        let mut seen_toolchains = HashSet::new();
        for toolchain in &self.matrix.toolchain {
            if toolchain.as_str().trim().is_empty() {
                anyhow::bail!("Matrix axis 'toolchain' contains an empty value");
            }
            if !seen_toolchains.insert(toolchain) {
                anyhow::bail!("Duplicate value '{}' on matrix axis 'toolchain'", toolchain);
            }
            if !toolchain.is_well_formed() {
                warn!(
                    "Toolchain '{}' does not look like a channel or version; provisioning may fail",
                    toolchain
                );
            }
        }

        if self.steps.is_empty() {
            anyhow::bail!("Pipeline '{}' has no steps", self.name);
        }

        // Check that all step IDs are unique
        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        for step in &self.steps {
            self.validate_step(step)?;
        }

        Ok(())
    }

    fn validate_step(&self, step: &StepConfig) -> Result<()> {
        match step.action_kind() {
            ActionKind::Run => {
                let command = step.run.as_deref().unwrap_or("").trim();
                if command.is_empty() {
                    anyhow::bail!("Step '{}' has no command to run", step.id);
                }
                shell_words::split(command)
                    .with_context(|| format!("Step '{}' has a malformed command line", step.id))?;
            }
            kind => {
                if step.run.is_some() {
                    anyhow::bail!(
                        "Step '{}' uses '{:?}' and cannot also declare 'run'",
                        step.id,
                        kind
                    );
                }
                if step.deny_warnings {
                    anyhow::bail!(
                        "Step '{}' sets deny_warnings but is not a 'run' step",
                        step.id
                    );
                }
            }
        }

        if step.action_kind() == ActionKind::Component
            && step.with.component.as_deref().unwrap_or("").trim().is_empty()
        {
            anyhow::bail!("Step '{}' adds a component but names none", step.id);
        }

        for os in &step.os {
            if !self.matrix.os.contains(os) {
                warn!(
                    "Step '{}' is restricted to '{}', which is not on the matrix",
                    step.id, os
                );
            }
        }

        Ok(())
    }

    /// Get variables as a string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => String::new(),
                    other => serde_yaml::to_string(other)
                        .unwrap_or_default()
                        .trim_end()
                        .to_string(),
                };
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Build the runnable pipeline
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}
