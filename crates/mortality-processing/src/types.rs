use crate::schema::{AgeBand, Sex};
use serde::{Deserialize, Serialize};

// ============================================================================
// Long-form records
// ============================================================================

/// One death count for a `(Country, Year, Cancer, Sex, Age)` cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub country: String,
    pub year: i64,
    pub cancer: String,
    pub sex: Sex,
    pub age: AgeBand,
    /// `None` when the source cell was empty.
    pub deaths: Option<f64>,
}

/// One population count for a `(Country, Year, Sex, Age)` cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub country: String,
    pub year: i64,
    pub sex: Sex,
    pub age: AgeBand,
    pub pop: Option<f64>,
}

/// A mortality record with population attached by the left join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub country: String,
    pub year: i64,
    pub cancer: String,
    pub sex: Sex,
    pub age: AgeBand,
    pub deaths: Option<f64>,
    pub pop: Option<f64>,
}

/// A record that survived the drop step: every field is present.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteRecord {
    pub country: String,
    pub year: i64,
    pub cancer: String,
    pub sex: Sex,
    pub age: AgeBand,
    pub deaths: f64,
    pub pop: f64,
}

/// A row of the derived table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub country: String,
    pub year: i64,
    pub cancer: String,
    pub age: AgeBand,
    pub sex: Sex,
    pub deaths: f64,
    pub pop: f64,
    /// Deaths per `rate_multiplier` population (100 000 by default).
    pub rate: f64,
}

/// Grouping key of the derived table, ordered `(Country, Year, Cancer, Age, Sex)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub country: String,
    pub year: i64,
    pub cancer: String,
    pub age: AgeBand,
    pub sex: Sex,
}

impl RateRecord {
    pub fn key(&self) -> GroupKey {
        GroupKey {
            country: self.country.clone(),
            year: self.year,
            cancer: self.cancer.clone(),
            age: self.age,
            sex: self.sex,
        }
    }
}

// ============================================================================
// Pipeline summary (for CLI and front-end display)
// ============================================================================

/// Row counts observed at each stage of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    /// Wide source rows read from each table.
    pub mortality_rows: usize,
    pub population_rows: usize,
    /// Source rows skipped because an identifier cell was empty.
    pub skipped_source_rows: usize,

    /// Long-form record counts after reshape.
    pub mortality_records: usize,
    pub population_records: usize,
    /// Population keys that appeared more than once and were summed.
    pub duplicate_population_keys: usize,

    /// Rows after the left join (always equal to `mortality_records`).
    pub joined_rows: usize,
    /// Joined rows that found a population value directly.
    pub matched_rows: usize,
    /// Population values filled from a later year.
    pub filled_values: usize,
    /// Rows dropped because a value was still missing.
    pub dropped_rows: usize,

    /// Groups after aggregation.
    pub aggregated_rows: usize,
    /// Groups removed because their summed population was not positive.
    pub zero_population_groups: usize,
    /// Rows in the derived table.
    pub output_rows: usize,

    /// Notes generated while processing.
    pub warnings: Vec<String>,
}

impl PipelineSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Share of joined rows that needed a backfilled population (0.0 - 1.0).
    pub fn fill_ratio(&self) -> f32 {
        if self.joined_rows == 0 {
            0.0
        } else {
            self.filled_values as f32 / self.joined_rows as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_key_ordering() {
        let a = GroupKey {
            country: "Austria".to_string(),
            year: 2015,
            cancer: "X".to_string(),
            age: AgeBand::Over64,
            sex: Sex::M,
        };
        let b = GroupKey {
            age: AgeBand::Under5,
            year: 2016,
            ..a.clone()
        };
        assert!(a < b, "year orders before age");
    }

    #[test]
    fn test_summary_fill_ratio() {
        let mut summary = PipelineSummary::new();
        assert_eq!(summary.fill_ratio(), 0.0);
        summary.joined_rows = 4;
        summary.filled_values = 1;
        assert_eq!(summary.fill_ratio(), 0.25);
    }

    #[test]
    fn test_summary_serialization() {
        let mut summary = PipelineSummary::new();
        summary.output_rows = 2;
        summary.add_warning("1 group had zero population");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"output_rows\":2"));
        assert!(json.contains("zero population"));
    }
}
