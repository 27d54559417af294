//! Stateless selections over the derived table.
//!
//! A [`Selection`] mirrors the dashboard inputs (year, sex, countries,
//! cancer). Applying it yields a [`View`]: a filtered copy of the matching
//! rows. The derived table itself is never modified. An empty view is a
//! normal outcome with its own user-facing message.

use crate::config::PipelineConfig;
use crate::error::{MortalityError, Result};
use crate::schema::{AgeBand, Sex};
use crate::table::{DerivedTable, records_to_dataframe};
use crate::types::RateRecord;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The user's current filter choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub year: i64,
    pub sex: Sex,
    pub countries: Vec<String>,
    pub cancer: String,
}

/// Population total for one country in the linked bar chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryPopulation {
    pub country: String,
    pub pop: f64,
}

impl Selection {
    /// The dashboard's initial selection: earliest year, males, and the
    /// configured default countries and cancer.
    ///
    /// Returns `None` for an empty table, which has no year to select.
    pub fn initial(table: &DerivedTable, config: &PipelineConfig) -> Option<Selection> {
        let (first_year, _) = table.year_range()?;
        Some(Selection {
            year: first_year,
            sex: Sex::M,
            countries: config.default_countries.clone(),
            cancer: config.default_cancer.clone(),
        })
    }

    pub fn with_year(mut self, year: i64) -> Self {
        self.year = year;
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancer(mut self, cancer: impl Into<String>) -> Self {
        self.cancer = cancer.into();
        self
    }

    /// Check the selection against the options the table offers.
    ///
    /// # Errors
    ///
    /// Returns [`MortalityError::InvalidSelection`] if the year lies outside
    /// the table's range. Unknown countries or cancers are not errors; they
    /// simply match nothing.
    pub fn validate(&self, table: &DerivedTable) -> Result<()> {
        if let Some((min, max)) = table.year_range()
            && !(min..=max).contains(&self.year)
        {
            return Err(MortalityError::InvalidSelection(format!(
                "year {} outside available range {}-{}",
                self.year, min, max
            )));
        }
        Ok(())
    }

    /// Filter the table down to the selected rows.
    pub fn apply(&self, table: &DerivedTable) -> View {
        let wanted: BTreeSet<&str> = self.countries.iter().map(String::as_str).collect();
        let records = table
            .records()
            .iter()
            .filter(|r| r.year == self.year)
            .filter(|r| r.sex == self.sex)
            .filter(|r| wanted.contains(r.country.as_str()))
            .filter(|r| r.cancer == self.cancer)
            .cloned()
            .collect();

        View {
            selection: self.clone(),
            records,
        }
    }
}

/// Rows matching a [`Selection`].
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    selection: Selection,
    records: Vec<RateRecord>,
}

impl View {
    pub fn selection(&self) -> &Selection {
        &self.selection
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

    /// Selected countries with no rows in this view, sorted.
    pub fn missing_countries(&self) -> Vec<String> {
        let present: BTreeSet<&str> = self.records.iter().map(|r| r.country.as_str()).collect();
        self.selection
            .countries
            .iter()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|c| !present.contains(c))
            .map(str::to_string)
            .collect()
    }

    /// Message to show instead of (or next to) the chart, if any.
    pub fn empty_state(&self) -> Option<String> {
        if self.records.is_empty() {
            return Some("No data available for given subset.".to_string());
        }
        let missing = self.missing_countries();
        if missing.is_empty() {
            None
        } else {
            Some(format!("No data available for {}.", missing.join(", ")))
        }
    }

    /// Chart title, e.g. "X mortality rates for females in 2015".
    pub fn title(&self) -> String {
        format!(
            "{} mortality rates for {} in {}",
            self.selection.cancer,
            self.selection.sex.noun_plural(),
            self.selection.year
        )
    }

    /// Population per country for one age band, or for all bands when `age`
    /// is `None`, largest first.
    pub fn population_by_country(&self, age: Option<AgeBand>) -> Vec<CountryPopulation> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for r in self.records.iter().filter(|r| age.is_none_or(|a| r.age == a)) {
            *totals.entry(r.country.as_str()).or_insert(0.0) += r.pop;
        }

        let mut rows: Vec<CountryPopulation> = totals
            .into_iter()
            .map(|(country, pop)| CountryPopulation {
                country: country.to_string(),
                pop,
            })
            .collect();
        rows.sort_by(|a, b| b.pop.total_cmp(&a.pop).then_with(|| a.country.cmp(&b.country)));
        rows
    }

    /// Rate for one `(country, age)` cell of the heatmap.
    pub fn rate(&self, country: &str, age: AgeBand) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.country == country && r.age == age)
            .map(|r| r.rate)
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        records_to_dataframe(&self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, year: i64, sex: Sex, age: AgeBand, pop: f64) -> RateRecord {
        RateRecord {
            country: country.to_string(),
            year,
            cancer: "Stomach".to_string(),
            age,
            sex,
            deaths: 1.0,
            pop,
            rate: 100_000.0 / pop,
        }
    }

    fn table() -> DerivedTable {
        DerivedTable::new(vec![
            row("Austria", 2015, Sex::M, AgeBand::Under5, 400.0),
            row("Austria", 2015, Sex::M, AgeBand::Over64, 600.0),
            row("Spain", 2015, Sex::M, AgeBand::Under5, 2000.0),
            row("Spain", 2015, Sex::F, AgeBand::Under5, 2100.0),
            row("Spain", 2016, Sex::M, AgeBand::Under5, 2200.0),
        ])
    }

    fn selection() -> Selection {
        Selection {
            year: 2015,
            sex: Sex::M,
            countries: vec!["Austria".to_string(), "Spain".to_string()],
            cancer: "Stomach".to_string(),
        }
    }

    #[test]
    fn test_apply_filters_every_dimension() {
        let view = selection().apply(&table());
        assert_eq!(view.len(), 3);
        assert!(view.records().iter().all(|r| r.year == 2015 && r.sex == Sex::M));
        assert_eq!(view.empty_state(), None);
    }

    #[test]
    fn test_apply_does_not_touch_table() {
        let table = table();
        let before = table.clone();
        let _ = selection().with_sex(Sex::F).apply(&table);
        assert_eq!(table, before);
    }

    #[test]
    fn test_empty_selection_message() {
        let view = selection().with_cancer("Unknown").apply(&table());
        assert!(view.is_empty());
        assert_eq!(
            view.empty_state().as_deref(),
            Some("No data available for given subset.")
        );
    }

    #[test]
    fn test_missing_countries_message() {
        let view = selection()
            .with_countries(["Spain", "Iceland", "Austria", "Chile"])
            .apply(&table());
        assert_eq!(view.missing_countries(), vec!["Chile", "Iceland"]);
        assert_eq!(
            view.empty_state().as_deref(),
            Some("No data available for Chile, Iceland.")
        );
    }

    #[test]
    fn test_title() {
        let view = selection().with_sex(Sex::F).apply(&table());
        assert_eq!(view.title(), "Stomach mortality rates for females in 2015");
    }

    #[test]
    fn test_population_by_country() {
        let view = selection().apply(&table());

        let all = view.population_by_country(None);
        assert_eq!(all[0].country, "Spain");
        assert_eq!(all[1].pop, 1000.0);

        let elderly = view.population_by_country(Some(AgeBand::Over64));
        assert_eq!(
            elderly,
            vec![CountryPopulation {
                country: "Austria".to_string(),
                pop: 600.0
            }]
        );
    }

    #[test]
    fn test_rate_lookup() {
        let view = selection().apply(&table());
        assert_eq!(view.rate("Spain", AgeBand::Under5), Some(50.0));
        assert_eq!(view.rate("Spain", AgeBand::Over64), None);
    }

    #[test]
    fn test_initial_selection_and_validation() {
        let config = PipelineConfig::default();
        let initial = Selection::initial(&table(), &config).unwrap();
        assert_eq!(initial.year, 2015);
        assert_eq!(initial.sex, Sex::M);
        assert_eq!(initial.cancer, "Malignant neoplasm of stomach");

        assert!(initial.validate(&table()).is_ok());
        assert!(initial.with_year(1990).validate(&table()).is_err());
        assert!(Selection::initial(&DerivedTable::default(), &config).is_none());
    }
}
