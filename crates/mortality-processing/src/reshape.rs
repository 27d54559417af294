//! Wide ↔ long reshaping of the source tables.
//!
//! Each wide row expands to one record per age column, in header order, so a
//! [`LongTable`] keeps the row-major layout needed to pivot it back exactly.

use crate::error::{MortalityError, Result};
use crate::schema::{
    AgeColumn, CANCER, COUNTRY, MORTALITY_SCHEMA, POPULATION_SCHEMA, SEX, Sex, TableSchema, YEAR,
};
use crate::types::{MortalityRecord, PopulationRecord};
use crate::utils::{float_column, integer_column, string_column};
use polars::prelude::*;
use tracing::{debug, warn};

/// Long-form records plus the age columns they were expanded from.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable<R> {
    pub records: Vec<R>,
    pub age_columns: Vec<AgeColumn>,
    /// Wide rows skipped because an identifier cell was empty.
    pub skipped_rows: usize,
}

impl<R> LongTable<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identifier cells of one wide row, already typed.
struct RowIds {
    country: String,
    year: i64,
    sex: Sex,
    cancer: Option<String>,
}

/// Typed identifier columns of a wide table, one entry per source row.
/// `None` marks a row with an empty identifier cell.
fn read_ids(df: &DataFrame, schema: &TableSchema) -> Result<Vec<Option<RowIds>>> {
    let countries = string_column(df, COUNTRY)?;
    let years = integer_column(df, YEAR, schema.name)?;
    let sexes = string_column(df, SEX)?;
    let cancers = if schema.id_columns.contains(&CANCER) {
        Some(string_column(df, CANCER)?)
    } else {
        None
    };

    let mut ids = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let cancer = cancers.as_ref().map(|c| c[row].clone());
        let (Some(country), Some(year), Some(sex_raw)) =
            (countries[row].clone(), years[row], sexes[row].as_deref())
        else {
            ids.push(None);
            continue;
        };
        if matches!(cancer, Some(None)) {
            ids.push(None);
            continue;
        }

        let sex = Sex::parse(sex_raw).ok_or_else(|| {
            MortalityError::schema_mismatch(
                schema.name,
                format!("unrecognised {} value '{}' in row {}", SEX, sex_raw, row + 1),
            )
        })?;

        ids.push(Some(RowIds {
            country,
            year,
            sex,
            cancer: cancer.flatten(),
        }));
    }
    Ok(ids)
}

/// Value columns, one vector per age column, validated non-negative.
fn read_values(
    df: &DataFrame,
    schema: &TableSchema,
    age_columns: &[AgeColumn],
) -> Result<Vec<Vec<Option<f64>>>> {
    age_columns
        .iter()
        .map(|col| {
            let values = float_column(df, &col.label, schema.name)?;
            if let Some(bad) = values.iter().flatten().find(|v| **v < 0.0) {
                return Err(MortalityError::schema_mismatch(
                    schema.name,
                    format!("column '{}' holds negative count {}", col.label, bad),
                ));
            }
            Ok(values)
        })
        .collect()
}

fn reshape<R>(
    df: &DataFrame,
    schema: &TableSchema,
    build: impl Fn(&RowIds, &AgeColumn, Option<f64>) -> R,
) -> Result<LongTable<R>> {
    let age_columns = schema.validate(df)?;
    let ids = read_ids(df, schema)?;
    let values = read_values(df, schema, &age_columns)?;

    let mut records = Vec::with_capacity(df.height() * age_columns.len());
    let mut skipped_rows = 0;
    for (row, row_ids) in ids.iter().enumerate() {
        let Some(row_ids) = row_ids else {
            skipped_rows += 1;
            continue;
        };
        for (col_idx, col) in age_columns.iter().enumerate() {
            records.push(build(row_ids, col, values[col_idx][row]));
        }
    }

    if skipped_rows > 0 {
        warn!(
            "Skipped {} {} rows with empty identifier cells",
            skipped_rows, schema.name
        );
    }
    debug!(
        "Reshaped {} {} rows x {} age bands into {} records",
        df.height() - skipped_rows,
        schema.name,
        age_columns.len(),
        records.len()
    );

    Ok(LongTable {
        records,
        age_columns,
        skipped_rows,
    })
}

/// Reshape the wide mortality table into one record per age band.
///
/// # Errors
///
/// Returns [`MortalityError::SchemaMismatch`] if the frame does not match
/// the mortality schema or holds unparseable identifiers or counts.
pub fn reshape_mortality(df: &DataFrame) -> Result<LongTable<MortalityRecord>> {
    reshape(df, &MORTALITY_SCHEMA, |ids, col, deaths| MortalityRecord {
        country: ids.country.clone(),
        year: ids.year,
        cancer: ids.cancer.clone().unwrap_or_default(),
        sex: ids.sex,
        age: col.band,
        deaths,
    })
}

/// Reshape the wide population table into one record per age band.
pub fn reshape_population(df: &DataFrame) -> Result<LongTable<PopulationRecord>> {
    reshape(df, &POPULATION_SCHEMA, |ids, col, pop| PopulationRecord {
        country: ids.country.clone(),
        year: ids.year,
        sex: ids.sex,
        age: col.band,
        pop,
    })
}

fn chunks_checked<'a, R>(table: &'a LongTable<R>, name: &str) -> Result<std::slice::Chunks<'a, R>> {
    let width = table.age_columns.len();
    if width == 0 || table.records.len() % width != 0 {
        return Err(MortalityError::Internal(format!(
            "{} long table has {} records for {} age columns",
            name,
            table.records.len(),
            width
        )));
    }
    Ok(table.records.chunks(width))
}

fn value_columns(age_columns: &[AgeColumn], values: Vec<Vec<Option<f64>>>) -> Vec<Column> {
    age_columns
        .iter()
        .zip(values)
        .map(|(col, vals)| Series::new(col.label.as_str().into(), vals).into())
        .collect()
}

/// Pivot a long mortality table back to its wide layout.
pub fn widen_mortality(table: &LongTable<MortalityRecord>) -> Result<DataFrame> {
    let mut countries = Vec::new();
    let mut years = Vec::new();
    let mut cancers = Vec::new();
    let mut sexes = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); table.age_columns.len()];

    for chunk in chunks_checked(table, "mortality")? {
        let first = &chunk[0];
        countries.push(first.country.clone());
        years.push(first.year);
        cancers.push(first.cancer.clone());
        sexes.push(first.sex.code());
        for (idx, record) in chunk.iter().enumerate() {
            values[idx].push(record.deaths);
        }
    }

    let mut columns: Vec<Column> = vec![
        Series::new(COUNTRY.into(), countries).into(),
        Series::new(YEAR.into(), years).into(),
        Series::new(CANCER.into(), cancers).into(),
        Series::new(SEX.into(), sexes).into(),
    ];
    columns.extend(value_columns(&table.age_columns, values));
    Ok(DataFrame::new(columns)?)
}

/// Pivot a long population table back to its wide layout.
pub fn widen_population(table: &LongTable<PopulationRecord>) -> Result<DataFrame> {
    let mut countries = Vec::new();
    let mut years = Vec::new();
    let mut sexes = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); table.age_columns.len()];

    for chunk in chunks_checked(table, "population")? {
        let first = &chunk[0];
        countries.push(first.country.clone());
        years.push(first.year);
        sexes.push(first.sex.code());
        for (idx, record) in chunk.iter().enumerate() {
            values[idx].push(record.pop);
        }
    }

    let mut columns: Vec<Column> = vec![
        Series::new(COUNTRY.into(), countries).into(),
        Series::new(YEAR.into(), years).into(),
        Series::new(SEX.into(), sexes).into(),
    ];
    columns.extend(value_columns(&table.age_columns, values));
    Ok(DataFrame::new(columns)?)
}
