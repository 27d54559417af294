//! Shared helpers for pulling typed columns out of polars frames.
//!
//! CSV type inference is not trusted: a count column may arrive as `String`
//! when a source writes thousands separators, and a year may arrive as a float
//! when a column contains blanks. These helpers normalise both.

use crate::error::{MortalityError, Result};
use polars::prelude::*;

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 2] = [',', ' '];

/// Common missing value markers in published tables.
pub const MISSING_MARKERS: [&str; 6] = ["", "n/a", "na", "nan", "null", ".."];

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a string is a missing value marker.
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a number, stripping thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let mut cleaned = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        cleaned = cleaned.replace(c, "");
    }
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| MortalityError::ColumnNotFound(name.to_string()))
}

/// Read a column as optional strings, casting non-string columns.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column_series(df, name)?;
    let as_str = series.cast(&DataType::String)?;
    let values = as_str
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !is_missing_marker(s))
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

/// Read a column as optional floats.
///
/// String columns are parsed value by value; missing markers become `None`
/// and anything else unparseable is a schema mismatch for `table`.
pub fn float_column(df: &DataFrame, name: &str, table: &str) -> Result<Vec<Option<f64>>> {
    let series = column_series(df, name)?;

    if is_numeric_dtype(series.dtype()) {
        let cast = series.cast(&DataType::Float64)?;
        let values = cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        return Ok(values);
    }

    if matches!(series.dtype(), DataType::Null) {
        return Ok(vec![None; series.len()]);
    }

    let as_str = series.cast(&DataType::String)?;
    as_str
        .str()?
        .into_iter()
        .map(|v| match v {
            None => Ok(None),
            Some(s) if is_missing_marker(s) => Ok(None),
            Some(s) => parse_numeric_string(s).map(Some).ok_or_else(|| {
                MortalityError::schema_mismatch(
                    table,
                    format!("column '{}' holds non-numeric value '{}'", name, s),
                )
            }),
        })
        .collect()
}

/// Read a column as optional integers. Fractional values are rejected.
pub fn integer_column(df: &DataFrame, name: &str, table: &str) -> Result<Vec<Option<i64>>> {
    float_column(df, name, table)?
        .into_iter()
        .map(|v| match v {
            None => Ok(None),
            Some(x) if x.fract() == 0.0 && x.is_finite() => Ok(Some(x as i64)),
            Some(x) => Err(MortalityError::schema_mismatch(
                table,
                format!("column '{}' holds non-integer value {}", name, x),
            )),
        })
        .collect()
}
