//! Imputation of missing population values.
//!
//! Provides the grouped backward fill applied after the left join.

mod backfill;

pub use backfill::GroupedBackfill;
