//! TTL-bounded local result cache for spendlens
//!
//! Cost data APIs are metered per request, so results of expensive fetches
//! are kept locally for a short, per-data-type TTL. Callers depend on the
//! [`CacheStore`] trait and can substitute [`MemoryCache`] or [`NoopCache`]
//! for the on-disk [`FileCache`].

pub mod file_cache;
pub mod key;
pub mod store;

pub use file_cache::FileCache;
pub use key::{CacheParams, cache_key};
pub use store::{
    CacheConfig, CacheEntry, CacheStats, CacheStore, Clock, DataType, MemoryCache, NoopCache,
};
