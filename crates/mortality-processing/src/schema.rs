//! Explicit schema for the two wide source tables and the derived table.
//!
//! Column names are fixed by the published datasets. Anything outside the
//! identifier columns must be an age-band column; the set of bands is closed.

use crate::error::{MortalityError, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COUNTRY: &str = "Country";
pub const YEAR: &str = "Year";
pub const CANCER: &str = "Cancer";
pub const SEX: &str = "Sex";
pub const AGE: &str = "Age";
pub const DEATHS: &str = "Deaths";
pub const POP: &str = "Pop";
pub const RATE: &str = "Rate";

/// Matches `Age <5`, `Age 5-14`, `Age >64` with optional inner whitespace.
static AGE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*Age\s*(?:<\s*(\d+)|>\s*(\d+)|(\d+)\s*-\s*(\d+))\s*$")
        .expect("Invalid regex: age band label")
});

/// One of the eight ordered age bands used by both source tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBand {
    #[serde(rename = "Age <5")]
    Under5,
    #[serde(rename = "Age 5-14")]
    From5To14,
    #[serde(rename = "Age 15-24")]
    From15To24,
    #[serde(rename = "Age 25-34")]
    From25To34,
    #[serde(rename = "Age 35-44")]
    From35To44,
    #[serde(rename = "Age 45-54")]
    From45To54,
    #[serde(rename = "Age 55-64")]
    From55To64,
    #[serde(rename = "Age >64")]
    Over64,
}

impl AgeBand {
    /// All bands in display order.
    pub const fn all() -> [AgeBand; 8] {
        [
            Self::Under5,
            Self::From5To14,
            Self::From15To24,
            Self::From25To34,
            Self::From35To44,
            Self::From45To54,
            Self::From55To64,
            Self::Over64,
        ]
    }

    /// Canonical label as it appears in the published datasets.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Under5 => "Age <5",
            Self::From5To14 => "Age 5-14",
            Self::From15To24 => "Age 15-24",
            Self::From25To34 => "Age 25-34",
            Self::From35To44 => "Age 35-44",
            Self::From45To54 => "Age 45-54",
            Self::From55To64 => "Age 55-64",
            Self::Over64 => "Age >64",
        }
    }

    /// Parse a column label into a band, ignoring whitespace differences.
    pub fn parse(label: &str) -> Option<AgeBand> {
        let caps = AGE_LABEL.captures(label)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        if let Some(upper) = num(1) {
            return (upper == 5).then_some(Self::Under5);
        }
        if let Some(lower) = num(2) {
            return (lower == 64).then_some(Self::Over64);
        }
        match (num(3)?, num(4)?) {
            (5, 14) => Some(Self::From5To14),
            (15, 24) => Some(Self::From15To24),
            (25, 34) => Some(Self::From25To34),
            (35, 44) => Some(Self::From35To44),
            (45, 54) => Some(Self::From45To54),
            (55, 64) => Some(Self::From55To64),
            _ => None,
        }
    }
}

impl fmt::Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

impl Sex {
    pub fn parse(value: &str) -> Option<Sex> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Self::M),
            "f" | "female" => Some(Self::F),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::M => "M",
            Self::F => "F",
        }
    }

    /// Plural noun used in chart titles.
    pub fn noun_plural(&self) -> &'static str {
        match self {
            Self::M => "males",
            Self::F => "females",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An age-band column found in a wide table: the band and its source label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeColumn {
    pub band: AgeBand,
    pub label: String,
}

/// Expected layout of a wide source table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    /// Table name used in error messages and logs.
    pub name: &'static str,
    /// Identifier columns, in source order.
    pub id_columns: &'static [&'static str],
    /// Name of the value column once the table is reshaped to long form.
    pub value_column: &'static str,
}

pub const MORTALITY_SCHEMA: TableSchema = TableSchema {
    name: "mortality",
    id_columns: &[COUNTRY, YEAR, CANCER, SEX],
    value_column: DEATHS,
};

pub const POPULATION_SCHEMA: TableSchema = TableSchema {
    name: "population",
    id_columns: &[COUNTRY, YEAR, SEX],
    value_column: POP,
};

impl TableSchema {
    /// Check a wide table against this schema and return its age columns in
    /// header order.
    ///
    /// # Errors
    ///
    /// Returns [`MortalityError::SchemaMismatch`] if an identifier column is
    /// missing, a non-identifier column is not an age band, a band appears
    /// twice, or there are no band columns at all.
    pub fn validate(&self, df: &DataFrame) -> Result<Vec<AgeColumn>> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let missing: Vec<&str> = self
            .id_columns
            .iter()
            .copied()
            .filter(|id| !names.iter().any(|n| n == id))
            .collect();
        if !missing.is_empty() {
            return Err(MortalityError::schema_mismatch(
                self.name,
                format!("missing identifier columns {:?}", missing),
            ));
        }

        let mut age_columns: Vec<AgeColumn> = Vec::new();
        let mut unknown = Vec::new();
        for name in names.iter().filter(|n| !self.id_columns.contains(&n.as_str())) {
            match AgeBand::parse(name) {
                Some(band) if age_columns.iter().any(|c| c.band == band) => {
                    return Err(MortalityError::schema_mismatch(
                        self.name,
                        format!("age band '{}' appears more than once", band),
                    ));
                }
                Some(band) => age_columns.push(AgeColumn {
                    band,
                    label: name.clone(),
                }),
                None => unknown.push(name.clone()),
            }
        }

        if !unknown.is_empty() {
            return Err(MortalityError::schema_mismatch(
                self.name,
                format!("unrecognised columns {:?}", unknown),
            ));
        }
        if age_columns.is_empty() {
            return Err(MortalityError::schema_mismatch(
                self.name,
                "no age band columns",
            ));
        }

        Ok(age_columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_band_labels_round_trip() {
        for band in AgeBand::all() {
            assert_eq!(AgeBand::parse(band.label()), Some(band));
        }
    }

    #[test]
    fn test_age_band_parse_tolerates_whitespace() {
        assert_eq!(AgeBand::parse("Age<5"), Some(AgeBand::Under5));
        assert_eq!(AgeBand::parse("Age 5 - 14"), Some(AgeBand::From5To14));
        assert_eq!(AgeBand::parse("Age > 64"), Some(AgeBand::Over64));
        assert_eq!(AgeBand::parse("Age 5-15"), None);
        assert_eq!(AgeBand::parse("Deaths"), None);
    }

    #[test]
    fn test_age_band_ordering() {
        let mut bands = vec![AgeBand::Over64, AgeBand::Under5, AgeBand::From35To44];
        bands.sort();
        assert_eq!(
            bands,
            vec![AgeBand::Under5, AgeBand::From35To44, AgeBand::Over64]
        );
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("M"), Some(Sex::M));
        assert_eq!(Sex::parse(" female "), Some(Sex::F));
        assert_eq!(Sex::parse("X"), None);
        assert_eq!(Sex::F.noun_plural(), "females");
    }

    #[test]
    fn test_validate_accepts_partial_band_set() {
        let df = df! {
            "Country" => &["Iceland"],
            "Year" => &[2015i64],
            "Sex" => &["F"],
            "Age<5" => &[1000.0],
            "Age 5-14" => &[2000.0],
        }
        .unwrap();

        let columns = POPULATION_SCHEMA.validate(&df).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].band, AgeBand::Under5);
        assert_eq!(columns[0].label, "Age<5");
    }

    #[test]
    fn test_validate_missing_identifier() {
        let df = df! {
            "Country" => &["Iceland"],
            "Sex" => &["F"],
            "Age <5" => &[1000.0],
        }
        .unwrap();

        let err = POPULATION_SCHEMA.validate(&df).unwrap_err();
        assert!(err.is_schema_mismatch());
        assert!(err.to_string().contains("Year"));
    }

    #[test]
    fn test_validate_unknown_column() {
        let df = df! {
            "Country" => &["Iceland"],
            "Year" => &[2015i64],
            "Sex" => &["F"],
            "Total" => &[3000.0],
        }
        .unwrap();

        let err = POPULATION_SCHEMA.validate(&df).unwrap_err();
        assert!(err.to_string().contains("Total"));
    }

    #[test]
    fn test_validate_duplicate_band() {
        let df = df! {
            "Country" => &["Iceland"],
            "Year" => &[2015i64],
            "Sex" => &["F"],
            "Age <5" => &[1.0],
            "Age<5" => &[2.0],
        }
        .unwrap();

        assert!(POPULATION_SCHEMA.validate(&df).is_err());
    }
}
