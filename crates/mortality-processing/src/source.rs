//! Fetch boundary for the two source tables.
//!
//! A source is a path or a URL. Fetching yields raw bytes; any failure to
//! obtain them is [`MortalityError::DataUnavailable`]. Parsing the bytes as
//! CSV happens in [`read_csv`], where failures are schema mismatches.
//!
//! # Custom fetchers
//!
//! Implement [`SourceFetcher`] to plug in another transport (an object store,
//! an in-memory fixture) without touching the pipeline:
//!
//! ```rust,ignore
//! use mortality_processing::source::{SourceFetcher, SourceLocation};
//!
//! struct Fixtures;
//!
//! impl SourceFetcher for Fixtures {
//!     fn fetch(&self, source: &SourceLocation) -> Result<Vec<u8>> {
//!         Ok(include_bytes!("fixtures/population.csv").to_vec())
//!     }
//! }
//! ```

use crate::error::{MortalityError, Result};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

#[cfg(feature = "remote")]
use reqwest::blocking::Client;
#[cfg(feature = "remote")]
use std::time::Duration;

/// Where a source table lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    Path(PathBuf),
    Url(String),
}

impl SourceLocation {
    /// Interpret an identifier: `http://` and `https://` prefixes are URLs,
    /// anything else is a filesystem path.
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    /// Identifier used for cache keys and error messages.
    pub fn identifier(&self) -> String {
        self.to_string()
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

impl From<&str> for SourceLocation {
    fn from(identifier: &str) -> Self {
        Self::parse(identifier)
    }
}

impl From<PathBuf> for SourceLocation {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

/// Trait for anything that can turn a [`SourceLocation`] into bytes.
///
/// Implementations must be `Send + Sync` so a pipeline can be moved to a
/// worker thread by the calling layer.
pub trait SourceFetcher: Send + Sync {
    /// Fetch the full contents of a source.
    ///
    /// # Errors
    ///
    /// Returns [`MortalityError::DataUnavailable`] when the source cannot be read.
    fn fetch(&self, source: &SourceLocation) -> Result<Vec<u8>>;

    /// Fetcher name for logging.
    fn name(&self) -> &str;
}

/// Reads paths from disk and URLs over HTTP (with the `remote` feature).
pub struct DefaultFetcher {
    #[cfg(feature = "remote")]
    client: Client,
}

impl DefaultFetcher {
    /// Create a fetcher whose HTTP requests time out after `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    #[cfg_attr(not(feature = "remote"), allow(unused_variables))]
    pub fn new(timeout_secs: u64) -> Result<Self> {
        #[cfg(feature = "remote")]
        {
            let client = Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|e| {
                    MortalityError::Internal(format!("Failed to build HTTP client: {}", e))
                })?;
            Ok(Self { client })
        }
        #[cfg(not(feature = "remote"))]
        {
            Ok(Self {})
        }
    }

    #[cfg(feature = "remote")]
    fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| MortalityError::data_unavailable(url, e))?;

        if !response.status().is_success() {
            return Err(MortalityError::data_unavailable(
                url,
                format!("HTTP status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .map_err(|e| MortalityError::data_unavailable(url, e))?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "remote"))]
    fn fetch_url(&self, url: &str) -> Result<Vec<u8>> {
        Err(MortalityError::data_unavailable(
            url,
            "remote sources require the `remote` feature",
        ))
    }
}

impl SourceFetcher for DefaultFetcher {
    fn fetch(&self, source: &SourceLocation) -> Result<Vec<u8>> {
        let bytes = match source {
            SourceLocation::Path(path) => std::fs::read(path)
                .map_err(|e| MortalityError::data_unavailable(source.identifier(), e))?,
            SourceLocation::Url(url) => self.fetch_url(url)?,
        };
        debug!("Fetched {} bytes from {}", bytes.len(), source);
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// Parse CSV bytes into a frame with every column read as `String`.
///
/// Numeric parsing happens per column in [`crate::utils`], so a decimal count
/// deep in the file cannot contradict a type guessed from the first rows.
///
/// # Errors
///
/// Returns [`MortalityError::SchemaMismatch`] if the bytes are not a readable
/// CSV table with a header row.
pub fn read_csv(bytes: Vec<u8>, table: &str) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| MortalityError::schema_mismatch(table, format!("unreadable CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            SourceLocation::parse("https://example.org/population.csv"),
            SourceLocation::Url("https://example.org/population.csv".to_string())
        );
        assert_eq!(
            SourceLocation::parse("data/population.csv"),
            SourceLocation::Path(PathBuf::from("data/population.csv"))
        );
        assert!(SourceLocation::from("http://x").is_remote());
    }

    #[test]
    fn test_missing_file_is_data_unavailable() {
        let fetcher = DefaultFetcher::new(5).unwrap();
        let err = fetcher
            .fetch(&SourceLocation::parse("/definitely/not/here.csv"))
            .unwrap_err();
        assert!(err.is_data_unavailable());
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_read_csv() {
        let bytes = b"Country,Year,Sex,Age <5\nIceland,2015,F,1000\n".to_vec();
        let df = read_csv(bytes, "population").unwrap();
        assert_eq!(df.shape(), (1, 4));
        assert!(df.dtypes().iter().all(|dtype| dtype == &DataType::String));
    }

    #[test]
    fn test_read_csv_keeps_late_decimal_counts() {
        let mut csv = String::from("Country,Year,Cancer,Sex,Age <5\n");
        for year in 1850..2000 {
            csv.push_str(&format!("Iceland,{},X,F,2\n", year));
        }
        csv.push_str("Iceland,2100,X,F,2.5\n");

        let df = read_csv(csv.into_bytes(), "mortality").unwrap();
        assert_eq!(df.height(), 151);
        let counts = crate::utils::float_column(&df, "Age <5", "mortality").unwrap();
        assert_eq!(counts[150], Some(2.5));
        assert_eq!(counts[0], Some(2.0));
    }
}
