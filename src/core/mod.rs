//! Core domain models for the pipeline
//!
//! This module defines the fundamental data structures that represent
//! pipelines, the build matrix, platform jobs, steps and their outcomes.

pub mod config;
pub mod context;
pub mod job;
pub mod matrix;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod trigger;

pub use context::*;
pub use job::*;
pub use matrix::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
