//! Shared test utilities
//!
//! Builders for fetch results and a scripted [`BillingFetcher`] double. The
//! module is compiled for this crate's unit tests and, behind the
//! `test-utils` feature, for the unit and integration tests of the other
//! spendlens crates.

use crate::error::FetchError;
use crate::fetcher::BillingFetcher;
use crate::types::{CostBucket, CostGroup, CostMetric, CostQuery};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Parse a decimal literal, panicking on malformed test input
pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).expect("valid decimal literal")
}

/// Calendar date shorthand
pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// One daily bucket with an `UnblendedCost` group per `(service, amount)` pair
pub fn daily_bucket(day: NaiveDate, services: &[(&str, &str)]) -> CostBucket {
    bucket_with_metric(day, CostMetric::UnblendedCost, services)
}

/// One daily bucket valued with `metric`
pub fn bucket_with_metric(
    day: NaiveDate,
    metric: CostMetric,
    services: &[(&str, &str)],
) -> CostBucket {
    CostBucket {
        period_start: Some(day),
        period_end: Some(day + Duration::days(1)),
        groups: services
            .iter()
            .map(|(name, amount)| CostGroup::new(*name).with_metric(metric, dec(amount), "USD"))
            .collect(),
    }
}

/// Fetcher that replays a fixed script of responses, one per call
///
/// Once the script is exhausted the last response keeps being returned.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<Vec<CostBucket>, FetchError>>>,
    last: Mutex<Option<Result<Vec<CostBucket>, FetchError>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<CostQuery>>,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<Vec<CostBucket>, FetchError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fetcher that fails `failures` times with `error`, then returns `buckets`
    pub fn failing_then(failures: usize, error: FetchError, buckets: Vec<CostBucket>) -> Self {
        let mut script: Vec<_> = (0..failures).map(|_| Err(error.clone())).collect();
        script.push(Ok(buckets));
        Self::new(script)
    }

    /// Number of times `fetch` was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received so far, in call order
    pub fn queries(&self) -> Vec<CostQuery> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl BillingFetcher for ScriptedFetcher {
    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostBucket>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().expect("queries lock").push(query.clone());

        let next = self.script.lock().expect("script lock").pop_front();
        let mut last = self.last.lock().expect("last lock");
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| Ok(Vec::new())),
        }
    }
}
