//! Cancer Mortality Data Preparation Library
//!
//! Turns two wide, age-banded tables (cancer deaths and population) into a
//! tidy table of mortality rates per 100,000, and answers the filter
//! selections of an exploration dashboard over it.
//!
//! # Overview
//!
//! - **Loading**: Fetch both CSV tables from a path or URL ([`source`])
//! - **Reshaping**: Pivot the eight age-band columns to long form ([`reshape`])
//! - **Joining**: Left join population onto deaths on `(Country, Year, Sex, Age)`
//! - **Filling**: Backward-fill missing population per `(Country, Sex, Age)`
//! - **Aggregating**: Sum duplicates per `(Country, Year, Cancer, Age, Sex)`
//! - **Rates**: `Rate = Deaths / Pop * 100000`
//! - **Selection**: Filter the derived table by year, sex, countries and cancer
//! - **Charts**: Vega-Lite specifications for the heatmap and population bars
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mortality_processing::{Pipeline, PipelineConfig, Selection};
//!
//! let config = PipelineConfig::builder()
//!     .mortality_source("data/cancer_ICD10.csv")
//!     .population_source("data/population.csv")
//!     .build()?;
//!
//! let output = Pipeline::builder()
//!     .config(config.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run()?;
//!
//! let selection = Selection::initial(&output.table, &config)
//!     .expect("table has rows")
//!     .with_year(2015);
//! let view = selection.apply(&output.table);
//!
//! match view.empty_state() {
//!     Some(message) => println!("{message}"),
//!     None => println!("{} rows for {}", view.len(), view.title()),
//! }
//! ```
//!
//! # Caching
//!
//! The pipeline is deterministic. A [`TableCache`] owned by the caller reuses
//! a derived table while both source payloads stay unchanged:
//!
//! ```rust,ignore
//! use mortality_processing::{CachePolicy, TableCache};
//! use std::time::Duration;
//!
//! let cache = TableCache::new(CachePolicy::max_age(Duration::from_secs(3600)));
//! let table = cache.get_or_compute(&pipeline)?;
//! ```
//!
//! # Errors
//!
//! A source that cannot be fetched is [`MortalityError::DataUnavailable`]; a
//! source that does not have the expected columns is
//! [`MortalityError::SchemaMismatch`]. An empty derived table or an empty
//! selection is not an error.

pub mod cache;
pub mod chart;
pub mod config;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod reshape;
pub mod schema;
pub mod selection;
pub mod source;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cache::{CacheKey, CachePolicy, CachedInfo, TableCache};
pub use chart::{dashboard_spec, heatmap_spec, population_bar_spec};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{MortalityError, Result as MortalityResult, ResultExt};
pub use imputers::GroupedBackfill;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineOutput, PipelineStage,
    ProgressReporter, ProgressUpdate, StageExecutor,
};
pub use reshape::{LongTable, reshape_mortality, reshape_population};
pub use schema::{AgeBand, MORTALITY_SCHEMA, POPULATION_SCHEMA, Sex, TableSchema};
pub use selection::{CountryPopulation, Selection, View};
pub use source::{DefaultFetcher, SourceFetcher, SourceLocation};
pub use table::DerivedTable;
pub use types::{
    CompleteRecord, GroupKey, JoinedRecord, MortalityRecord, PipelineSummary, PopulationRecord,
    RateRecord,
};
