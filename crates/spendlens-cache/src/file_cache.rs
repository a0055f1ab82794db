//! File-backed cache persisted as a single JSON document
//!
//! Entries live in memory and are written to `api_cache.json` under the
//! cache directory every [`CacheConfig::flush_every`] writes, on explicit
//! [`CacheStore::flush`], and when the cache is dropped. Writes go to a
//! temporary file that is renamed into place, so a reader never sees a
//! partially written store. Concurrent writers from several processes are
//! not coordinated; the last flush wins.

use crate::key::CacheParams;
use crate::store::{CacheConfig, CacheEntry, CacheStats, CacheStore, Clock, DataType, EntryTable};
use serde_json::Value;
use spendlens_core::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the persisted store inside the cache directory
pub const CACHE_FILE_NAME: &str = "api_cache.json";

/// Persistent TTL cache
pub struct FileCache {
    path: PathBuf,
    table: EntryTable,
    pending_writes: usize,
    dirty: bool,
}

impl FileCache {
    /// Open the cache stored under `dir`, creating the directory if needed
    ///
    /// A missing file yields an empty cache. An unreadable or malformed file
    /// is logged and treated as empty; it is replaced on the next flush.
    pub fn open(dir: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        Self::open_with_clock(dir, config, Arc::new(chrono::Utc::now))
    }

    /// Like [`FileCache::open`] with an injected time source
    pub fn open_with_clock(dir: impl AsRef<Path>, config: CacheConfig, clock: Clock) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(CACHE_FILE_NAME);

        let mut table = EntryTable::new(config, clock);
        table.entries = load_entries(&path);
        let purged = table.purge_expired();

        info!(
            path = %path.display(),
            entries = table.entries.len(),
            "Opened cache"
        );

        Ok(Self {
            path,
            table,
            pending_writes: 0,
            dirty: purged > 0,
        })
    }

    /// Location of the persisted store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&mut self) -> Result<()> {
        self.table.purge_expired();

        let mut bytes = serde_json::to_vec_pretty(&self.table.entries)?;
        if bytes.len() as u64 > self.table.config.max_size_bytes {
            self.evict_oldest_quarter();
            bytes = serde_json::to_vec_pretty(&self.table.entries)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;

        self.pending_writes = 0;
        self.dirty = false;
        debug!(
            path = %self.path.display(),
            entries = self.table.entries.len(),
            bytes = bytes.len(),
            "Flushed cache"
        );
        Ok(())
    }

    /// Remove the oldest quarter of entries, rounded up so at least one goes
    fn evict_oldest_quarter(&mut self) {
        let mut by_age: Vec<(&String, &CacheEntry)> = self.table.entries.iter().collect();
        by_age.sort_by_key(|(_, entry)| entry.created_at);

        let count = self.table.entries.len().div_ceil(4);
        let victims: Vec<String> = by_age
            .into_iter()
            .take(count)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &victims {
            self.table.entries.remove(key);
        }
        info!(evicted = victims.len(), "Cache over size budget, evicted oldest entries");
    }
}

impl CacheStore for FileCache {
    fn get(&mut self, operation: &str, _data_type: DataType, params: &CacheParams) -> Option<Value> {
        let (value, purged) = self.table.get(operation, params);
        if purged {
            self.dirty = true;
        }
        value
    }

    fn set(
        &mut self,
        operation: &str,
        payload: Value,
        data_type: DataType,
        params: &CacheParams,
    ) -> Result<()> {
        self.table.set(operation, payload, data_type, params);
        self.dirty = true;
        self.pending_writes += 1;

        if self.pending_writes >= self.table.config.flush_every.max(1) {
            self.persist()?;
        }
        Ok(())
    }

    fn invalidate(&mut self, operation: Option<&str>, params: &CacheParams) -> Result<()> {
        self.table.invalidate(operation, params);
        self.persist()
    }

    fn stats(&self) -> CacheStats {
        let size = fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0);
        self.table.stats(size)
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.persist() {
                warn!(error = %e, "Failed to flush cache on shutdown");
            }
        }
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("path", &self.path)
            .field("entries", &self.table.entries.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Read persisted entries, skipping any that fail to parse
fn load_entries(path: &Path) -> BTreeMap<String, CacheEntry> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read cache file, starting empty");
            return BTreeMap::new();
        }
    };

    let raw: BTreeMap<String, Value> = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not parse cache file, starting empty");
            return BTreeMap::new();
        }
    };

    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        match serde_json::from_value::<CacheEntry>(value) {
            Ok(entry) => {
                entries.insert(key, entry);
            }
            Err(e) => debug!(key = %key, error = %e, "Skipping corrupt cache entry"),
        }
    }
    entries
}
