//! Cache store interface and in-memory implementations

use crate::key::{CacheParams, cache_key};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spendlens_core::Result;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Source of the current time, injectable for tests
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Category of cached data, selecting the entry TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    CostData,
    AccountInfo,
    ServiceList,
    Rightsizing,
    Tags,
    Config,
}

impl DataType {
    /// Default time-to-live in seconds
    pub fn default_ttl_seconds(self) -> u64 {
        match self {
            Self::CostData => 3600,
            Self::AccountInfo => 86_400,
            Self::ServiceList => 86_400,
            Self::Rightsizing => 3600,
            Self::Tags => 1800,
            Self::Config => 300,
        }
    }
}

/// Tunables shared by all cache implementations
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serialized store size above which the oldest quarter is evicted
    pub max_size_bytes: u64,
    /// Number of writes between automatic flushes
    pub flush_every: usize,
    /// Recorded per entry whose operation is a metered cost call
    pub api_call_cost: Decimal,
    /// Per data type TTL replacements, in seconds
    pub ttl_overrides: HashMap<DataType, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            flush_every: 10,
            // Cost Explorer charges $0.01 per request
            api_call_cost: Decimal::new(1, 2),
            ttl_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, data_type: DataType) -> u64 {
        self.ttl_overrides
            .get(&data_type)
            .copied()
            .unwrap_or_else(|| data_type.default_ttl_seconds())
    }

    fn cost_weight(&self, operation: &str) -> Decimal {
        if operation.to_lowercase().contains("cost") {
            self.api_call_cost
        } else {
            Decimal::ZERO
        }
    }
}

/// One cached payload with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub cost_weight: Decimal,
}

impl CacheEntry {
    /// An entry is expired once strictly more than its TTL has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > self.ttl()
    }

    /// TTL as a duration, saturating for values chrono cannot represent
    pub fn ttl(&self) -> Duration {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 60.0
    }
}

/// Hit/miss accounting and store size
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
    pub hit_rate_percent: f64,
    pub hits: u64,
    pub misses: u64,
    pub api_calls_saved: u64,
    pub estimated_cost_savings: Decimal,
}

/// Interface every cache implementation provides
pub trait CacheStore {
    /// Cached payload for `(operation, params)`, or `None` on a miss
    ///
    /// Expired entries count as misses and are removed.
    fn get(&mut self, operation: &str, data_type: DataType, params: &CacheParams) -> Option<Value>;

    /// Store `payload` with the TTL of `data_type`
    fn set(
        &mut self,
        operation: &str,
        payload: Value,
        data_type: DataType,
        params: &CacheParams,
    ) -> Result<()>;

    /// Remove one entry, or every entry when `operation` is `None`
    fn invalidate(&mut self, operation: Option<&str>, params: &CacheParams) -> Result<()>;

    fn stats(&self) -> CacheStats;

    /// Persist pending writes, if the implementation persists at all
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: CacheStore + ?Sized> CacheStore for Box<T> {
    fn get(&mut self, operation: &str, data_type: DataType, params: &CacheParams) -> Option<Value> {
        (**self).get(operation, data_type, params)
    }

    fn set(
        &mut self,
        operation: &str,
        payload: Value,
        data_type: DataType,
        params: &CacheParams,
    ) -> Result<()> {
        (**self).set(operation, payload, data_type, params)
    }

    fn invalidate(&mut self, operation: Option<&str>, params: &CacheParams) -> Result<()> {
        (**self).invalidate(operation, params)
    }

    fn stats(&self) -> CacheStats {
        (**self).stats()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Map of live entries plus hit/miss counters
///
/// Shared by [`MemoryCache`] and [`crate::FileCache`]; the latter adds
/// persistence around it.
pub(crate) struct EntryTable {
    pub(crate) entries: BTreeMap<String, CacheEntry>,
    pub(crate) config: CacheConfig,
    clock: Clock,
    hits: u64,
    misses: u64,
    api_calls_saved: u64,
    cost_savings: Decimal,
}

impl EntryTable {
    pub(crate) fn new(config: CacheConfig, clock: Clock) -> Self {
        Self {
            entries: BTreeMap::new(),
            config,
            clock,
            hits: 0,
            misses: 0,
            api_calls_saved: 0,
            cost_savings: Decimal::ZERO,
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub(crate) fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    /// Returns the payload and whether an expired entry was purged
    pub(crate) fn get(&mut self, operation: &str, params: &CacheParams) -> (Option<Value>, bool) {
        let key = cache_key(operation, params);
        let now = self.now();

        let mut purged = false;
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired(now) {
                self.hits += 1;
                self.api_calls_saved += 1;
                self.cost_savings += entry.cost_weight;
                debug!(
                    operation,
                    key = %key,
                    age_minutes = entry.age_minutes(now),
                    "Cache hit"
                );
                return (Some(entry.data.clone()), false);
            }

            debug!(
                operation,
                key = %key,
                age_minutes = entry.age_minutes(now),
                "Cache entry expired"
            );
            self.entries.remove(&key);
            purged = true;
        }

        self.misses += 1;
        debug!(operation, key = %key, "Cache miss");
        (None, purged)
    }

    pub(crate) fn set(
        &mut self,
        operation: &str,
        payload: Value,
        data_type: DataType,
        params: &CacheParams,
    ) {
        let key = cache_key(operation, params);
        let ttl_seconds = self.config.ttl_for(data_type);
        let entry = CacheEntry {
            key: key.clone(),
            data: payload,
            created_at: self.now(),
            ttl_seconds,
            cost_weight: self.config.cost_weight(operation),
        };
        debug!(operation, key = %key, ttl_minutes = ttl_seconds / 60, "Cached result");
        self.entries.insert(key, entry);
    }

    pub(crate) fn invalidate(&mut self, operation: Option<&str>, params: &CacheParams) {
        match operation {
            Some(operation) => {
                let key = cache_key(operation, params);
                if self.entries.remove(&key).is_some() {
                    info!(operation, "Invalidated cache entry");
                }
            }
            None => {
                let count = self.entries.len();
                self.entries.clear();
                info!(count, "Cleared all cache entries");
            }
        }
    }

    /// Drop every expired entry, returning how many were removed
    pub(crate) fn purge_expired(&mut self) -> usize {
        let now = self.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "Cleaned expired cache entries");
        }
        removed
    }

    pub(crate) fn stats(&self, size_bytes: u64) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            self.hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.entries.len(),
            size_bytes,
            hit_rate_percent: (hit_rate * 10.0).round() / 10.0,
            hits: self.hits,
            misses: self.misses,
            api_calls_saved: self.api_calls_saved,
            estimated_cost_savings: self.cost_savings.round_dp(2),
        }
    }
}

/// Process-local cache with no persistence
pub struct MemoryCache {
    table: EntryTable,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            table: EntryTable::new(config, Arc::new(Utc::now)),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.table.set_clock(clock);
        self
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheStore for MemoryCache {
    fn get(&mut self, operation: &str, _data_type: DataType, params: &CacheParams) -> Option<Value> {
        self.table.get(operation, params).0
    }

    fn set(
        &mut self,
        operation: &str,
        payload: Value,
        data_type: DataType,
        params: &CacheParams,
    ) -> Result<()> {
        self.table.set(operation, payload, data_type, params);
        Ok(())
    }

    fn invalidate(&mut self, operation: Option<&str>, params: &CacheParams) -> Result<()> {
        self.table.invalidate(operation, params);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let size = self
            .table
            .entries
            .values()
            .filter_map(|entry| serde_json::to_vec(entry).ok())
            .map(|bytes| bytes.len() as u64)
            .sum();
        self.table.stats(size)
    }
}

/// Cache that never stores anything; every lookup is a miss
#[derive(Debug, Default)]
pub struct NoopCache {
    misses: u64,
}

impl CacheStore for NoopCache {
    fn get(&mut self, _operation: &str, _data_type: DataType, _params: &CacheParams) -> Option<Value> {
        self.misses += 1;
        None
    }

    fn set(&mut self, _: &str, _: Value, _: DataType, _: &CacheParams) -> Result<()> {
        Ok(())
    }

    fn invalidate(&mut self, _operation: Option<&str>, _params: &CacheParams) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            misses: self.misses,
            ..CacheStats::default()
        }
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.table.entries.len())
            .finish()
    }
}
