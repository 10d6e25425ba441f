//! matrixci - expand a build matrix, run every job and gate the push

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use core::{
    FailureKind, JobOutcome, MatrixCell, MatrixSelection, OsFamily, Pipeline, PipelineOutcome,
    PipelineTrigger, PlatformJob, Step, StepState, ToolchainVersion, Verdict,
};
pub use execution::{ExecutionEngine, ExecutionEvent, RunSettings, SchedulingStrategy};
pub use runner::{CommandRunner, CommandSpec, RunnerPool};
