//! CLI command definitions

use crate::core::{MatrixSelection, OsFamily, PipelineTrigger, ToolchainVersion};
use crate::execution::SchedulingStrategy;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Run the pipeline for a pushed commit (the repository's HEAD by default)
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Ref being pushed, as the pre-push hook reports it
    #[arg(long = "ref", value_name = "REF", requires = "sha")]
    pub git_ref: Option<String>,

    /// Commit being pushed
    #[arg(long, requires = "git_ref")]
    pub sha: Option<String>,

    /// Path to pipeline YAML file (defaults to the built-in Rust pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Job limit for `--strategy parallel-limited`
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Only run jobs for these operating-system families
    #[arg(long, value_delimiter = ',')]
    pub os: Vec<OsFamily>,

    /// Only run jobs for these toolchains
    #[arg(long, value_delimiter = ',')]
    pub toolchain: Vec<String>,

    /// Only run jobs this machine has a runner for
    #[arg(long, conflicts_with = "os")]
    pub host_only: bool,

    /// Repository to check out into each job
    #[arg(long, default_value = ".")]
    pub source: PathBuf,

    /// Parent directory of the per-job working directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Lines of a failing step's output shown in the report
    #[arg(long, default_value_t = 20)]
    pub output_lines: usize,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub fn strategy(&self) -> SchedulingStrategy {
        match self.strategy {
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(self.max_parallel),
            other => other.into(),
        }
    }

    /// The push named by `--ref`/`--sha`, if given
    pub fn pushed_trigger(&self) -> Option<PipelineTrigger> {
        match (&self.git_ref, &self.sha) {
            (Some(git_ref), Some(sha)) => Some(PipelineTrigger::push(git_ref.as_str(), sha.as_str())),
            _ => None,
        }
    }

    pub fn selection(&self) -> MatrixSelection {
        let mut selection = if self.host_only {
            MatrixSelection::host_only()
        } else {
            MatrixSelection {
                os: self.os.clone(),
                toolchain: Vec::new(),
            }
        };
        selection.toolchain = self.toolchain.iter().map(|t| ToolchainVersion::new(t.as_str())).collect();
        selection
    }
}

/// Print the expanded matrix and every job's commands
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file (defaults to the built-in Rust pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines found in history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show pass/fail counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub details: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run by trigger id
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Manage the git pre-push hook
#[derive(Debug, Args, Clone)]
pub struct HookCommand {
    #[command(subcommand)]
    pub action: HookAction,
}

#[derive(Debug, Subcommand, Clone)]
pub enum HookAction {
    /// Run the pipeline before every push
    Install {
        /// Repository to install into
        #[arg(long, default_value = ".")]
        repo: PathBuf,

        /// Extra arguments passed to `matrixci run`
        #[arg(long, default_value = "--host-only")]
        run_args: String,

        /// Replace a pre-push hook that was not written by matrixci
        #[arg(long)]
        force: bool,
    },

    /// Remove the hook installed by `hook install`
    Uninstall {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl From<SchedulingStrategyArg> for SchedulingStrategy {
    fn from(arg: SchedulingStrategyArg) -> Self {
        match arg {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(4),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
