//! Main pipeline module.
//!
//! This module provides the `Pipeline` struct and builder that turn the two
//! wide source tables into the derived rate table.

use crate::config::PipelineConfig;
use crate::error::{MortalityError, Result, ResultExt};
use crate::imputers::GroupedBackfill;
use crate::pipeline::executor::StageExecutor;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::reshape::{reshape_mortality, reshape_population};
use crate::schema::{MORTALITY_SCHEMA, POPULATION_SCHEMA};
use crate::source::{DefaultFetcher, SourceFetcher, read_csv};
use crate::table::DerivedTable;
use crate::types::PipelineSummary;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// The mortality preparation pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use mortality_processing::{Pipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .mortality_source("data/cancer_ICD10.csv")
///     .population_source("data/population.csv")
///     .build()?;
///
/// let output = Pipeline::builder().config(config).build()?.run()?;
/// println!("{} rows", output.table.len());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn SourceFetcher>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    executor: StageExecutor,
}

// The calling layer may run the pipeline on a worker thread.
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

/// The derived table together with what happened while building it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: DerivedTable,
    pub summary: PipelineSummary,
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &dyn SourceFetcher {
        self.fetcher.as_ref()
    }

    /// Fetch both configured sources and build the derived table.
    ///
    /// # Errors
    ///
    /// Returns [`MortalityError::DataUnavailable`] if either source cannot be
    /// fetched and [`MortalityError::SchemaMismatch`] if either is malformed.
    /// No partial table is ever returned.
    pub fn run(&self) -> Result<PipelineOutput> {
        self.report_outcome(self.run_internal())
    }

    /// Build the derived table from already fetched CSV payloads.
    pub fn process_bytes(
        &self,
        mortality_csv: Vec<u8>,
        population_csv: Vec<u8>,
    ) -> Result<PipelineOutput> {
        self.report_outcome(self.process_bytes_internal(mortality_csv, population_csv))
    }

    /// Build the derived table from two wide frames already in memory.
    pub fn process(&self, mortality: &DataFrame, population: &DataFrame) -> Result<PipelineOutput> {
        self.report_outcome(self.process_internal(mortality, population, Instant::now()))
    }

    fn report_outcome(&self, outcome: Result<PipelineOutput>) -> Result<PipelineOutput> {
        match outcome {
            Ok(output) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Derived {} rows",
                    output.table.len()
                )));
                Ok(output)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self) -> Result<PipelineOutput> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            "Fetching source tables...",
        ));
        info!("Fetching mortality table from {}", self.config.mortality_source);
        let mortality = self
            .fetcher
            .fetch(&self.config.mortality_source)
            .context("Loading mortality table")?;

        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.5,
            "Mortality table fetched",
        ));
        info!(
            "Fetching population table from {}",
            self.config.population_source
        );
        let population = self
            .fetcher
            .fetch(&self.config.population_source)
            .context("Loading population table")?;

        self.process_bytes_internal(mortality, population)
    }

    fn process_bytes_internal(
        &self,
        mortality_csv: Vec<u8>,
        population_csv: Vec<u8>,
    ) -> Result<PipelineOutput> {
        let start = Instant::now();
        let mortality = read_csv(mortality_csv, MORTALITY_SCHEMA.name)?;
        let population = read_csv(population_csv, POPULATION_SCHEMA.name)?;
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Loading,
            mortality.height() + population.height(),
            "Source tables loaded",
        ));

        self.process_internal(&mortality, &population, start)
    }

    fn process_internal(
        &self,
        mortality: &DataFrame,
        population: &DataFrame,
        start: Instant,
    ) -> Result<PipelineOutput> {
        let mut summary = PipelineSummary::new();
        summary.mortality_rows = mortality.height();
        summary.population_rows = population.height();

        // Step 1: Schema
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Validating,
            0.0,
            "Validating source schemas...",
        ));
        MORTALITY_SCHEMA.validate(mortality)?;
        POPULATION_SCHEMA.validate(population)?;

        // Step 2: Reshape
        info!("Step 1: Reshaping wide tables to long form...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Reshaping,
            0.0,
            "Reshaping tables...",
        ));
        let mortality_long = reshape_mortality(mortality)?;
        let population_long = reshape_population(population)?;
        summary.mortality_records = mortality_long.len();
        summary.population_records = population_long.len();
        summary.skipped_source_rows = mortality_long.skipped_rows + population_long.skipped_rows;
        if summary.skipped_source_rows > 0 {
            summary.add_warning(format!(
                "Skipped {} source rows with empty identifier cells",
                summary.skipped_source_rows
            ));
        }
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Reshaping,
            summary.mortality_records,
            "Tables reshaped",
        ));

        // Step 3: Left join
        info!("Step 2: Joining population onto mortality...");
        let joined = self
            .executor
            .left_join(&mortality_long.records, &population_long.records);
        if joined.rows.len() != mortality_long.len() {
            return Err(MortalityError::Internal(format!(
                "left join produced {} rows for {} mortality records",
                joined.rows.len(),
                mortality_long.len()
            )));
        }
        summary.joined_rows = joined.rows.len();
        summary.matched_rows = joined.matched;
        summary.duplicate_population_keys = joined.duplicate_population_keys;
        if joined.duplicate_population_keys > 0 {
            summary.add_warning(format!(
                "Summed {} duplicate population keys",
                joined.duplicate_population_keys
            ));
        }
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Joining,
            summary.joined_rows,
            "Population joined",
        ));

        // Step 4: Grouped backward fill
        info!("Step 3: Backward-filling population gaps...");
        let mut rows = joined.rows;
        summary.filled_values = GroupedBackfill::apply(&mut rows);
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Filling,
            summary.filled_values,
            format!("Filled {} population values", summary.filled_values),
        ));

        // Step 5: Drop incomplete rows
        info!("Step 4: Dropping incomplete rows...");
        let (complete, dropped) = self.executor.drop_incomplete(rows);
        summary.dropped_rows = dropped;
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Cleaning,
            complete.len(),
            format!("Dropped {} incomplete rows", dropped),
        ));

        // Step 6: Aggregate
        info!("Step 5: Aggregating groups...");
        let groups = self.executor.aggregate(complete);
        summary.aggregated_rows = groups.len();
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::Aggregating,
            groups.len(),
            "Groups aggregated",
        ));

        // Step 7: Rates
        info!("Step 6: Deriving rates...");
        let rates = self.executor.derive_rates(groups);
        summary.zero_population_groups = rates.zero_population_groups;
        if rates.zero_population_groups > 0 {
            summary.add_warning(format!(
                "Removed {} groups with zero population",
                rates.zero_population_groups
            ));
        }
        let table = DerivedTable::new(rates.rows);
        summary.output_rows = table.len();
        self.report_progress(ProgressUpdate::finished(
            PipelineStage::RateDerivation,
            table.len(),
            "Rates derived",
        ));

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Pipeline complete: {} rows in {}ms",
            summary.output_rows, summary.duration_ms
        );

        Ok(PipelineOutput { table, summary })
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default file/HTTP fetcher.
    pub fn fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let pipeline = Pipeline::builder()
    ///     .on_progress(|update| {
    ///         println!("[{:.0}%] {:?}: {}",
    ///             update.progress * 100.0,
    ///             update.stage,
    ///             update.message
    ///         );
    ///     })
    ///     .build()?;
    /// ```
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`MortalityError::InvalidConfig`] if the configuration is
    /// invalid, or an internal error if the default fetcher cannot be created.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| MortalityError::InvalidConfig(e.to_string()))?;

        let fetcher: Arc<dyn SourceFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(DefaultFetcher::new(config.fetch_timeout_secs)?),
        };

        Ok(Pipeline {
            executor: StageExecutor::new(config.rate_multiplier),
            config,
            fetcher,
            progress_reporter: self.progress_reporter,
        })
    }
}
