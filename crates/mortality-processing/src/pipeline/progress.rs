//! Progress reporting for the mortality pipeline.
//!
//! The pipeline runs synchronously and cannot be cancelled; a reporter only
//! observes stage transitions, e.g. to drive a loading indicator.
//!
//! # Example
//!
//! ```rust,ignore
//! use mortality_processing::Pipeline;
//!
//! let output = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the mortality pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Fetching both source tables
    Loading,
    /// Checking source columns against the expected schema
    Validating,
    /// Pivoting wide tables to long form
    Reshaping,
    /// Left-joining population onto mortality
    Joining,
    /// Backward-filling missing population
    Filling,
    /// Dropping rows that are still incomplete
    Cleaning,
    /// Summing duplicate groups
    Aggregating,
    /// Computing deaths per population base
    RateDerivation,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Sources",
            Self::Validating => "Validating Schema",
            Self::Reshaping => "Reshaping Tables",
            Self::Joining => "Joining Population",
            Self::Filling => "Filling Population Gaps",
            Self::Cleaning => "Dropping Incomplete Rows",
            Self::Aggregating => "Aggregating Groups",
            Self::RateDerivation => "Deriving Rates",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of total run time this stage typically takes (0.0 - 1.0).
    ///
    /// Weights of the processing stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.40,
            Self::Validating => 0.05,
            Self::Reshaping => 0.15,
            Self::Joining => 0.15,
            Self::Filling => 0.10,
            Self::Cleaning => 0.03,
            Self::Aggregating => 0.10,
            Self::RateDerivation => 0.02,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Validating => 0.40,
            Self::Reshaping => 0.45,
            Self::Joining => 0.60,
            Self::Filling => 0.75,
            Self::Cleaning => 0.85,
            Self::Aggregating => 0.88,
            Self::RateDerivation => 0.98,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A progress update emitted at stage boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Rows produced by the stage, when it has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            rows: None,
        }
    }

    /// A finished-stage update carrying the stage's output row count.
    pub fn finished(stage: PipelineStage, rows: usize, message: impl Into<String>) -> Self {
        Self {
            rows: Some(rows),
            ..Self::new(stage, 1.0, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress: 0.0,
            stage_progress: 0.0,
            ..Self::new(PipelineStage::Failed, 0.0, message)
        }
    }
}

/// Trait for receiving progress updates from the pipeline.
///
/// Implementations must be `Send + Sync` so the calling layer can run the
/// pipeline on a worker thread while reporting to its own UI thread.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
