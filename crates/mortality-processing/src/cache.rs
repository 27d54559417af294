//! Session cache for derived tables.
//!
//! The pipeline is deterministic, so a derived table can be reused for as
//! long as both source payloads are unchanged. The cache is an explicit
//! object owned by the caller; nothing here is global.
//!
//! Entries live behind a `parking_lot::RwLock`, so one cache can be shared
//! across threads (e.g. request handlers serving the same dashboard).

use crate::error::{Result, ResultExt};
use crate::pipeline::Pipeline;
use crate::source::SourceLocation;
use crate::table::DerivedTable;
use crate::types::PipelineSummary;
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Identity of a cached derived table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mortality: SourceLocation,
    pub population: SourceLocation,
    /// Hash over both fetched payloads.
    pub content_hash: u64,
}

impl CacheKey {
    pub fn new(
        mortality: SourceLocation,
        population: SourceLocation,
        mortality_bytes: &[u8],
        population_bytes: &[u8],
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        mortality_bytes.hash(&mut hasher);
        population_bytes.hash(&mut hasher);
        Self {
            mortality,
            population,
            content_hash: hasher.finish(),
        }
    }

    fn same_sources(&self, mortality: &SourceLocation, population: &SourceLocation) -> bool {
        &self.mortality == mortality && &self.population == population
    }
}

/// How long entries stay valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// `None` keeps entries until they are invalidated or cleared.
    pub max_age: Option<Duration>,
}

impl CachePolicy {
    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    table: Arc<DerivedTable>,
    summary: PipelineSummary,
    created: Instant,
    computed_at: DateTime<Local>,
}

impl CacheEntry {
    fn is_fresh(&self, policy: &CachePolicy) -> bool {
        policy
            .max_age
            .is_none_or(|max_age| self.created.elapsed() < max_age)
    }
}

/// Summary of one cached table, for display.
#[derive(Debug, Clone)]
pub struct CachedInfo {
    pub key: CacheKey,
    pub rows: usize,
    pub computed_at: String,
    pub summary: PipelineSummary,
}

/// Memoizes derived tables per source pair and payload content.
#[derive(Debug, Default)]
pub struct TableCache {
    policy: CachePolicy,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

static_assertions::assert_impl_all!(TableCache: Send, Sync);

impl TableCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Fetch both configured sources and return the derived table, running
    /// the pipeline only if no fresh entry exists for these payloads.
    ///
    /// Failed runs are never cached.
    pub fn get_or_compute(&self, pipeline: &Pipeline) -> Result<Arc<DerivedTable>> {
        let config = pipeline.config();
        let mortality_bytes = pipeline
            .fetcher()
            .fetch(&config.mortality_source)
            .context("Loading mortality table")?;
        let population_bytes = pipeline
            .fetcher()
            .fetch(&config.population_source)
            .context("Loading population table")?;

        let key = CacheKey::new(
            config.mortality_source.clone(),
            config.population_source.clone(),
            &mortality_bytes,
            &population_bytes,
        );

        if let Some(entry) = self.entries.read().get(&key)
            && entry.is_fresh(&self.policy)
        {
            debug!("Cache hit for {} + {}", key.mortality, key.population);
            return Ok(Arc::clone(&entry.table));
        }

        let output = pipeline.process_bytes(mortality_bytes, population_bytes)?;
        let table = Arc::new(output.table);

        let mut entries = self.entries.write();
        // Payloads changed upstream: older entries for the same sources are dead.
        entries.retain(|k, _| k == &key || !k.same_sources(&key.mortality, &key.population));
        entries.insert(
            key,
            CacheEntry {
                table: Arc::clone(&table),
                summary: output.summary,
                created: Instant::now(),
                computed_at: Local::now(),
            },
        );
        info!("Cached derived table with {} rows", table.len());

        Ok(table)
    }

    /// Fresh table for a source pair without fetching anything.
    pub fn cached(
        &self,
        mortality: &SourceLocation,
        population: &SourceLocation,
    ) -> Option<Arc<DerivedTable>> {
        self.entries
            .read()
            .iter()
            .filter(|(k, e)| k.same_sources(mortality, population) && e.is_fresh(&self.policy))
            .max_by_key(|(_, e)| e.created)
            .map(|(_, e)| Arc::clone(&e.table))
    }

    /// Describe every entry, stale ones included.
    pub fn entries(&self) -> Vec<CachedInfo> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| CachedInfo {
                key: key.clone(),
                rows: entry.table.len(),
                computed_at: entry.computed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                summary: entry.summary.clone(),
            })
            .collect()
    }

    /// Drop one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
