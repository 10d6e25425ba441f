//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod gate;
pub mod provisioner;
pub mod scheduler;

pub use engine::{EventHandler, EventSink, ExecutionEngine, ExecutionEvent, RunSettings};
pub use executor::{ExecutionResult, StepExecutor};
pub use gate::{aggregate, GateAggregator};
pub use provisioner::ToolchainProvisioner;
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
