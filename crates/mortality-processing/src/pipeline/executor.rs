//! Relational stages of the pipeline: join, drop, aggregate, derive rates.
//!
//! Each stage is a pure function over owned or borrowed records. Iteration
//! order is fixed (input order or key order), so repeated runs on the same
//! inputs produce identical output.

use crate::schema::{AgeBand, Sex};
use crate::types::{
    CompleteRecord, GroupKey, JoinedRecord, MortalityRecord, PopulationRecord, RateRecord,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

type PopulationKey<'a> = (&'a str, i64, Sex, AgeBand);

/// Stage executor for the mortality pipeline.
pub struct StageExecutor {
    rate_multiplier: f64,
}

/// Result of the left join with the counts the summary needs.
#[derive(Debug)]
pub struct JoinOutcome {
    pub rows: Vec<JoinedRecord>,
    pub matched: usize,
    pub duplicate_population_keys: usize,
}

/// Result of rate derivation.
#[derive(Debug)]
pub struct RateOutcome {
    pub rows: Vec<RateRecord>,
    pub zero_population_groups: usize,
}

impl StageExecutor {
    pub fn new(rate_multiplier: f64) -> Self {
        Self { rate_multiplier }
    }

    /// Attach population to every mortality record on
    /// `(Country, Year, Sex, Age)`.
    ///
    /// Produces exactly one row per mortality record, in input order. Present
    /// population values sharing a key are summed first so the join never
    /// duplicates a mortality row.
    pub fn left_join(
        &self,
        mortality: &[MortalityRecord],
        population: &[PopulationRecord],
    ) -> JoinOutcome {
        let mut index: HashMap<PopulationKey<'_>, Option<f64>> =
            HashMap::with_capacity(population.len());
        let mut duplicate_population_keys = 0;

        for record in population {
            let key = (record.country.as_str(), record.year, record.sex, record.age);
            match index.get_mut(&key) {
                Some(existing) => {
                    duplicate_population_keys += 1;
                    *existing = match (*existing, record.pop) {
                        (Some(a), Some(b)) => Some(a + b),
                        (a, b) => a.or(b),
                    };
                }
                None => {
                    index.insert(key, record.pop);
                }
            }
        }

        if duplicate_population_keys > 0 {
            warn!(
                "Summed {} duplicate population keys before joining",
                duplicate_population_keys
            );
        }

        let mut matched = 0;
        let rows: Vec<JoinedRecord> = mortality
            .iter()
            .map(|m| {
                let pop = index
                    .get(&(m.country.as_str(), m.year, m.sex, m.age))
                    .copied()
                    .flatten();
                if pop.is_some() {
                    matched += 1;
                }
                JoinedRecord {
                    country: m.country.clone(),
                    year: m.year,
                    cancer: m.cancer.clone(),
                    sex: m.sex,
                    age: m.age,
                    deaths: m.deaths,
                    pop,
                }
            })
            .collect();

        debug!("Joined {} rows, {} with population", rows.len(), matched);

        JoinOutcome {
            rows,
            matched,
            duplicate_population_keys,
        }
    }

    /// Keep only rows where every field is present.
    pub fn drop_incomplete(&self, rows: Vec<JoinedRecord>) -> (Vec<CompleteRecord>, usize) {
        let before = rows.len();
        let complete: Vec<CompleteRecord> = rows
            .into_iter()
            .filter_map(|r| {
                Some(CompleteRecord {
                    deaths: r.deaths?,
                    pop: r.pop?,
                    country: r.country,
                    year: r.year,
                    cancer: r.cancer,
                    sex: r.sex,
                    age: r.age,
                })
            })
            .collect();
        let dropped = before - complete.len();
        debug!("Dropped {} incomplete rows", dropped);
        (complete, dropped)
    }

    /// Sum `Deaths` and `Pop` per `(Country, Year, Cancer, Age, Sex)`.
    ///
    /// Returns groups in key order.
    pub fn aggregate(&self, rows: Vec<CompleteRecord>) -> Vec<(GroupKey, f64, f64)> {
        let mut groups: BTreeMap<GroupKey, (f64, f64)> = BTreeMap::new();
        for r in rows {
            let key = GroupKey {
                country: r.country,
                year: r.year,
                cancer: r.cancer,
                age: r.age,
                sex: r.sex,
            };
            let entry = groups.entry(key).or_insert((0.0, 0.0));
            entry.0 += r.deaths;
            entry.1 += r.pop;
        }
        groups
            .into_iter()
            .map(|(key, (deaths, pop))| (key, deaths, pop))
            .collect()
    }

    /// Compute `Rate = Deaths / Pop * multiplier` for each aggregated group.
    ///
    /// Groups whose population is not strictly positive have no defined rate
    /// and are removed.
    pub fn derive_rates(&self, groups: Vec<(GroupKey, f64, f64)>) -> RateOutcome {
        let mut zero_population_groups = 0;
        let rows = groups
            .into_iter()
            .filter_map(|(key, deaths, pop)| {
                if pop <= 0.0 {
                    zero_population_groups += 1;
                    return None;
                }
                Some(RateRecord {
                    country: key.country,
                    year: key.year,
                    cancer: key.cancer,
                    age: key.age,
                    sex: key.sex,
                    deaths,
                    pop,
                    rate: deaths / pop * self.rate_multiplier,
                })
            })
            .collect();

        if zero_population_groups > 0 {
            warn!(
                "Removed {} groups with zero population",
                zero_population_groups
            );
        }

        RateOutcome {
            rows,
            zero_population_groups,
        }
    }
}
