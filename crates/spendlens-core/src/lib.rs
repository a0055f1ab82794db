//! Core types, traits, and utilities for spendlens
//!
//! This crate provides the foundational types, the error taxonomy, window
//! resolution and the billing fetcher interface used by all other spendlens
//! crates.

pub mod error;
pub mod fetcher;
pub mod report_types;
pub mod types;
pub mod window;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use error::{ClassifiedError, ErrorKind, FetchError, Result, SpendlensError};
pub use fetcher::BillingFetcher;
pub use types::{CostBucket, CostGroup, CostMetric, CostQuery, CostRecord, Granularity, TimeWindow};
