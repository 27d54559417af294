//! Custom error types for the mortality preparation pipeline.
//!
//! Every stage failure aborts the whole pipeline; there is no partial output.
//! An empty result is not an error and never appears here.
//!
//! Errors are serializable so a front end can render them as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the mortality pipeline.
#[derive(Error, Debug)]
pub enum MortalityError {
    /// A source table could not be fetched (file or network failure).
    #[error("Data unavailable from '{source_id}': {reason}")]
    DataUnavailable { source_id: String, reason: String },

    /// A source table does not match its expected schema.
    #[error("Schema mismatch in {table} table: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Column was not found in a table.
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A selection lies outside the options the table offers.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error while fetching a remote source (only with "remote" feature).
    #[cfg(feature = "remote")]
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MortalityError>,
    },
}

impl MortalityError {
    /// Build a [`MortalityError::DataUnavailable`] for a source identifier.
    pub fn data_unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`MortalityError::SchemaMismatch`] for a named table.
    pub fn schema_mismatch(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MortalityError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidSelection(_) => "INVALID_SELECTION",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "remote")]
            Self::Http(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means a source could not be fetched.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            Self::DataUnavailable { .. } => true,
            #[cfg(feature = "remote")]
            Self::Http(_) => true,
            Self::WithContext { source, .. } => source.is_data_unavailable(),
            _ => false,
        }
    }

    /// Check if this error means a source did not match its schema.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            Self::SchemaMismatch { .. } | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_schema_mismatch(),
            _ => false,
        }
    }
}

impl Serialize for MortalityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("MortalityError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, MortalityError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| MortalityError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            MortalityError::data_unavailable("pop.csv", "not found").error_code(),
            "DATA_UNAVAILABLE"
        );
        assert_eq!(
            MortalityError::schema_mismatch("mortality", "missing Year").error_code(),
            "SCHEMA_MISMATCH"
        );
    }

    #[test]
    fn test_classification() {
        assert!(MortalityError::data_unavailable("x", "boom").is_data_unavailable());
        assert!(!MortalityError::data_unavailable("x", "boom").is_schema_mismatch());
        assert!(MortalityError::ColumnNotFound("Year".to_string()).is_schema_mismatch());
    }

    #[test]
    fn test_error_serialization() {
        let error = MortalityError::schema_mismatch("population", "missing column 'Sex'");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("SCHEMA_MISMATCH"));
        assert!(json.contains("Sex"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let error = MortalityError::data_unavailable("cancer.csv", "timeout")
            .with_context("Loading mortality table");
        assert!(error.to_string().contains("Loading mortality table"));
        assert_eq!(error.error_code(), "DATA_UNAVAILABLE");
        assert!(error.is_data_unavailable());
    }
}
