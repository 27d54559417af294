//! The derived table: one row per `(Country, Year, Cancer, Age, Sex)`.
//!
//! Built once per load and read-only afterwards. Rows are kept sorted by the
//! grouping key, which makes every serialization of the table deterministic.

use crate::error::Result;
use crate::schema::{AGE, CANCER, COUNTRY, DEATHS, POP, RATE, SEX, YEAR};
use crate::types::RateRecord;
use polars::prelude::*;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTable {
    records: Vec<RateRecord>,
}

static_assertions::assert_impl_all!(DerivedTable: Send, Sync);

impl DerivedTable {
    /// Wrap records, sorting them by grouping key.
    pub fn new(mut records: Vec<RateRecord>) -> Self {
        records.sort_by_key(|r| r.key());
        Self { records }
    }

    pub fn records(&self) -> &[RateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest year, or `None` for an empty table.
    pub fn year_range(&self) -> Option<(i64, i64)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Distinct countries, sorted.
    pub fn countries(&self) -> Vec<String> {
        self.distinct(|r| r.country.as_str())
    }

    /// Distinct cancers, sorted.
    pub fn cancers(&self) -> Vec<String> {
        self.distinct(|r| r.cancer.as_str())
    }

    fn distinct<'a>(&'a self, field: impl Fn(&'a RateRecord) -> &'a str) -> Vec<String> {
        self.records
            .iter()
            .map(field)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Materialize as a polars frame with columns
    /// `Country, Year, Cancer, Age, Sex, Deaths, Pop, Rate`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        records_to_dataframe(&self.records)
    }

    /// Deterministic CSV rendering of the table.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut df = self.to_dataframe()?;
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }
}

/// Build a frame in derived-table column order from any slice of rows.
pub(crate) fn records_to_dataframe(records: &[RateRecord]) -> Result<DataFrame> {
    let df = df! {
        COUNTRY => records.iter().map(|r| r.country.as_str()).collect::<Vec<_>>(),
        YEAR => records.iter().map(|r| r.year).collect::<Vec<_>>(),
        CANCER => records.iter().map(|r| r.cancer.as_str()).collect::<Vec<_>>(),
        AGE => records.iter().map(|r| r.age.label()).collect::<Vec<_>>(),
        SEX => records.iter().map(|r| r.sex.code()).collect::<Vec<_>>(),
        DEATHS => records.iter().map(|r| r.deaths).collect::<Vec<_>>(),
        POP => records.iter().map(|r| r.pop).collect::<Vec<_>>(),
        RATE => records.iter().map(|r| r.rate).collect::<Vec<_>>(),
    }?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AgeBand, Sex};

    fn row(country: &str, year: i64, age: AgeBand) -> RateRecord {
        RateRecord {
            country: country.to_string(),
            year,
            cancer: "X".to_string(),
            age,
            sex: Sex::F,
            deaths: 1.0,
            pop: 100.0,
            rate: 1000.0,
        }
    }

    #[test]
    fn test_new_sorts_by_key() {
        let table = DerivedTable::new(vec![
            row("Spain", 2015, AgeBand::Under5),
            row("Austria", 2016, AgeBand::Over64),
            row("Austria", 2016, AgeBand::Under5),
        ]);

        let keys: Vec<_> = table
            .records()
            .iter()
            .map(|r| (r.country.as_str(), r.age))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Austria", AgeBand::Under5),
                ("Austria", AgeBand::Over64),
                ("Spain", AgeBand::Under5),
            ]
        );
    }

    #[test]
    fn test_options() {
        let table = DerivedTable::new(vec![
            row("Spain", 2015, AgeBand::Under5),
            row("Austria", 2012, AgeBand::Under5),
            row("Spain", 2016, AgeBand::Under5),
        ]);

        assert_eq!(table.year_range(), Some((2012, 2016)));
        assert_eq!(table.countries(), vec!["Austria", "Spain"]);
        assert_eq!(table.cancers(), vec!["X"]);
        assert_eq!(DerivedTable::default().year_range(), None);
    }

    #[test]
    fn test_to_dataframe_columns() {
        let table = DerivedTable::new(vec![row("Spain", 2015, AgeBand::Under5)]);
        let df = table.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec!["Country", "Year", "Cancer", "Age", "Sex", "Deaths", "Pop", "Rate"]
        );
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_empty_table_materializes() {
        let df = DerivedTable::default().to_dataframe().unwrap();
        assert_eq!(df.shape(), (0, 8));
    }
}
