//! Pipeline module.
//!
//! This module provides the mortality pipeline and related components.

mod builder;
mod executor;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, PipelineOutput};
pub use executor::{JoinOutcome, RateOutcome, StageExecutor};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
