//! Grouped backward fill of population values.
//!
//! Population figures are published less often than death counts. A year
//! without a population figure takes the next later figure available for the
//! same `(Country, Sex, Age)` partition. Values are copied, never averaged.

use crate::schema::{AgeBand, Sex};
use crate::types::JoinedRecord;
use std::collections::BTreeMap;
use tracing::debug;

/// Backward fill of `pop` within `(Country, Sex, Age)` partitions.
pub struct GroupedBackfill;

impl GroupedBackfill {
    /// Fill absent `pop` values in place and return how many were filled.
    ///
    /// Each partition is ordered by `Year` ascending (ties keep input order)
    /// and scanned from the latest year backward, carrying the most recent
    /// present value. Rows after the last present value stay absent.
    pub fn apply(records: &mut [JoinedRecord]) -> usize {
        let mut partitions: BTreeMap<(&str, Sex, AgeBand), Vec<usize>> = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            partitions
                .entry((record.country.as_str(), record.sex, record.age))
                .or_default()
                .push(idx);
        }

        let mut fills: Vec<(usize, f64)> = Vec::new();
        for indices in partitions.into_values() {
            let mut ordered = indices;
            ordered.sort_by_key(|&idx| records[idx].year);
            Self::scan_partition(records, &ordered, &mut fills);
        }

        let filled = fills.len();
        for (idx, value) in fills {
            records[idx].pop = Some(value);
        }

        debug!("Backward fill filled {} population values", filled);
        filled
    }

    fn scan_partition(records: &[JoinedRecord], ordered: &[usize], fills: &mut Vec<(usize, f64)>) {
        let mut next: Option<f64> = None;
        for &idx in ordered.iter().rev() {
            match records[idx].pop {
                Some(value) => next = Some(value),
                None => {
                    if let Some(value) = next {
                        fills.push((idx, value));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(country: &str, year: i64, age: AgeBand, pop: Option<f64>) -> JoinedRecord {
        JoinedRecord {
            country: country.to_string(),
            year,
            cancer: "X".to_string(),
            sex: Sex::F,
            age,
            deaths: Some(1.0),
            pop,
        }
    }

    #[test]
    fn test_fills_from_next_later_year() {
        let mut records = vec![
            record("Spain", 2013, AgeBand::Under5, None),
            record("Spain", 2014, AgeBand::Under5, None),
            record("Spain", 2015, AgeBand::Under5, Some(500.0)),
            record("Spain", 2016, AgeBand::Under5, None),
            record("Spain", 2017, AgeBand::Under5, Some(700.0)),
        ];

        let filled = GroupedBackfill::apply(&mut records);

        assert_eq!(filled, 3);
        let pops: Vec<_> = records.iter().map(|r| r.pop).collect();
        assert_eq!(
            pops,
            vec![Some(500.0), Some(500.0), Some(500.0), Some(700.0), Some(700.0)]
        );
    }

    #[test]
    fn test_fill_ignores_input_order() {
        let mut records = vec![
            record("Spain", 2017, AgeBand::Under5, Some(700.0)),
            record("Spain", 2014, AgeBand::Under5, None),
            record("Spain", 2015, AgeBand::Under5, Some(500.0)),
            record("Spain", 2016, AgeBand::Under5, None),
        ];

        GroupedBackfill::apply(&mut records);

        assert_eq!(records[1].pop, Some(500.0));
        assert_eq!(records[3].pop, Some(700.0));
    }

    #[test]
    fn test_trailing_gaps_stay_absent() {
        let mut records = vec![
            record("Spain", 2015, AgeBand::Under5, Some(500.0)),
            record("Spain", 2016, AgeBand::Under5, None),
        ];

        assert_eq!(GroupedBackfill::apply(&mut records), 0);
        assert_eq!(records[1].pop, None);
    }

    #[test]
    fn test_partitions_do_not_leak() {
        let mut records = vec![
            record("Spain", 2015, AgeBand::Under5, None),
            record("Spain", 2016, AgeBand::From5To14, Some(900.0)),
            record("Sweden", 2016, AgeBand::Under5, Some(800.0)),
        ];

        assert_eq!(GroupedBackfill::apply(&mut records), 0);
        assert_eq!(records[0].pop, None);
    }

    #[test]
    fn test_filled_values_come_from_later_years() {
        let mut records = vec![
            record("Iceland", 2010, AgeBand::Over64, None),
            record("Iceland", 2012, AgeBand::Over64, Some(20.0)),
            record("Iceland", 2011, AgeBand::Over64, None),
            record("Iceland", 2014, AgeBand::Over64, Some(30.0)),
        ];
        let original = records.clone();

        GroupedBackfill::apply(&mut records);

        for (after, before) in records.iter().zip(&original) {
            if before.pop.is_none() {
                let value = after.pop.unwrap();
                assert!(original
                    .iter()
                    .any(|o| o.year > before.year && o.pop == Some(value)));
            }
        }
    }
}
