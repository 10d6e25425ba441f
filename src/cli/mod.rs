//! Command-line interface

pub mod commands;
pub mod hook;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, HookCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Matrix CI runner: verify every push on each os × toolchain
#[derive(Debug, Parser, Clone)]
#[command(name = "matrixci")]
#[command(version)]
#[command(about = "Expand a build matrix, run every job and gate the push on the result", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipeline for the current HEAD
    Run(RunCommand),

    /// Show the expanded matrix without running it
    Plan(PlanCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List pipelines in history
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),

    /// Install or remove the git pre-push hook
    Hook(HookCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
