//! Billing data fetcher trait
//!
//! This module defines the `BillingFetcher` trait that every source of cost
//! data implements. The engine only ever talks to this interface; network
//! clients, recorded-response readers and test doubles are interchangeable.

use crate::error::FetchError;
use crate::types::{CostBucket, CostQuery};
use async_trait::async_trait;

/// Source of time-bucketed cost data.
///
/// Implementations report failures as raw [`FetchError`]s and must not retry
/// on their own; retries are applied around them by the resilience layer.
#[async_trait]
pub trait BillingFetcher: Send + Sync {
    /// Fetch the buckets covering `query.window`, `end` exclusive.
    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostBucket>, FetchError>;
}

#[async_trait]
impl<T: BillingFetcher + ?Sized> BillingFetcher for std::sync::Arc<T> {
    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostBucket>, FetchError> {
        (**self).fetch(query).await
    }
}
