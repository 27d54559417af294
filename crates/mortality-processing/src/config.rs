//! Configuration types for the mortality pipeline.
//!
//! This module provides configuration options using the builder pattern,
//! including the source locations and the dashboard's default selection.

use crate::source::SourceLocation;
use serde::{Deserialize, Serialize};

/// Published cancer mortality table (ICD-10 coded).
pub const DEFAULT_MORTALITY_URL: &str =
    "https://raw.githubusercontent.com/hms-dbmi/bmi706-2022/main/cancer_data/cancer_ICD10.csv";

/// Published population table.
pub const DEFAULT_POPULATION_URL: &str =
    "https://raw.githubusercontent.com/hms-dbmi/bmi706-2022/main/cancer_data/population.csv";

/// Rates are expressed per this many people.
pub const DEFAULT_RATE_MULTIPLIER: f64 = 100_000.0;

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CANCER: &str = "Malignant neoplasm of stomach";
const DEFAULT_COUNTRIES: [&str; 7] = [
    "Austria", "Germany", "Iceland", "Spain", "Sweden", "Thailand", "Turkey",
];

/// Configuration for the mortality pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use mortality_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .mortality_source("data/cancer_ICD10.csv")
///     .population_source("data/population.csv")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wide mortality table.
    pub mortality_source: SourceLocation,

    /// Wide population table.
    pub population_source: SourceLocation,

    /// Rates are deaths per this many people.
    /// Default: 100000
    pub rate_multiplier: f64,

    /// Timeout for remote fetches.
    /// Default: 30
    pub fetch_timeout_secs: u64,

    /// Countries pre-selected in the dashboard.
    pub default_countries: Vec<String>,

    /// Cancer pre-selected in the dashboard.
    /// Default: "Malignant neoplasm of stomach"
    pub default_cancer: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mortality_source: SourceLocation::parse(DEFAULT_MORTALITY_URL),
            population_source: SourceLocation::parse(DEFAULT_POPULATION_URL),
            rate_multiplier: DEFAULT_RATE_MULTIPLIER,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            default_countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            default_cancer: DEFAULT_CANCER.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.rate_multiplier.is_finite() && self.rate_multiplier > 0.0) {
            return Err(ConfigValidationError::InvalidRateMultiplier(
                self.rate_multiplier,
            ));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }

        for (field, source) in [
            ("mortality_source", &self.mortality_source),
            ("population_source", &self.population_source),
        ] {
            if source.identifier().trim().is_empty() {
                return Err(ConfigValidationError::EmptySource(field.to_string()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid rate multiplier: {0} (must be a positive number)")]
    InvalidRateMultiplier(f64),

    #[error("Invalid fetch timeout: must be at least 1 second")]
    InvalidTimeout,

    #[error("Source '{0}' must not be empty")]
    EmptySource(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    mortality_source: Option<SourceLocation>,
    population_source: Option<SourceLocation>,
    rate_multiplier: Option<f64>,
    fetch_timeout_secs: Option<u64>,
    default_countries: Option<Vec<String>>,
    default_cancer: Option<String>,
}

impl PipelineConfigBuilder {
    /// Set the mortality table location (path or URL).
    pub fn mortality_source(mut self, source: impl Into<SourceLocation>) -> Self {
        self.mortality_source = Some(source.into());
        self
    }

    /// Set the population table location (path or URL).
    pub fn population_source(mut self, source: impl Into<SourceLocation>) -> Self {
        self.population_source = Some(source.into());
        self
    }

    /// Set the population base for rates (e.g. 100000 for "per 100k").
    pub fn rate_multiplier(mut self, multiplier: f64) -> Self {
        self.rate_multiplier = Some(multiplier);
        self
    }

    /// Set the timeout for remote fetches in seconds.
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = Some(secs);
        self
    }

    /// Set the countries pre-selected in the dashboard.
    pub fn default_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_countries = Some(countries.into_iter().map(Into::into).collect());
        self
    }

    /// Set the cancer pre-selected in the dashboard.
    pub fn default_cancer(mut self, cancer: impl Into<String>) -> Self {
        self.default_cancer = Some(cancer.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            mortality_source: self.mortality_source.unwrap_or(defaults.mortality_source),
            population_source: self.population_source.unwrap_or(defaults.population_source),
            rate_multiplier: self.rate_multiplier.unwrap_or(defaults.rate_multiplier),
            fetch_timeout_secs: self
                .fetch_timeout_secs
                .unwrap_or(defaults.fetch_timeout_secs),
            default_countries: self.default_countries.unwrap_or(defaults.default_countries),
            default_cancer: self.default_cancer.unwrap_or(defaults.default_cancer),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.rate_multiplier, 100_000.0);
        assert!(config.mortality_source.is_remote());
        assert!(config.population_source.is_remote());
        assert_eq!(config.default_countries.len(), 7);
        assert_eq!(config.default_cancer, "Malignant neoplasm of stomach");
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .mortality_source("data/cancer.csv")
            .population_source("data/pop.csv")
            .rate_multiplier(1000.0)
            .default_countries(["Spain"])
            .build()
            .unwrap();

        assert_eq!(
            config.mortality_source,
            SourceLocation::Path(PathBuf::from("data/cancer.csv"))
        );
        assert_eq!(config.rate_multiplier, 1000.0);
        assert_eq!(config.default_countries, vec!["Spain".to_string()]);
    }

    #[test]
    fn test_validation_invalid_multiplier() {
        let result = PipelineConfig::builder().rate_multiplier(0.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRateMultiplier(_)
        ));
    }

    #[test]
    fn test_validation_empty_source() {
        let result = PipelineConfig::builder().population_source("  ").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptySource(field) if field == "population_source"
        ));
    }

    #[test]
    fn test_validation_zero_timeout() {
        assert!(PipelineConfig::builder().fetch_timeout_secs(0).build().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "mortality_source": {"path": "fixtures/mortality.csv"},
            "population_source": {"url": "https://example.org/pop.csv"},
            "rate_multiplier": 100000.0,
            "fetch_timeout_secs": 10,
            "default_countries": ["Iceland"],
            "default_cancer": "X"
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.mortality_source.is_remote());
        assert!(config.population_source.is_remote());
        assert_eq!(config.fetch_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }
}
