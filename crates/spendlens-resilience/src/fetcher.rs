//! Retrying, classifying wrapper around a [`BillingFetcher`]

use crate::classify::ClassificationRules;
use crate::retry::RetryPolicy;
use spendlens_core::error::Result;
use spendlens_core::fetcher::BillingFetcher;
use spendlens_core::types::{CostBucket, CostQuery};
use tracing::debug;

/// Operation name used in logs for billing fetches
const FETCH_OPERATION: &str = "get_cost_and_usage";

/// Billing fetcher guarded by a retry policy
///
/// Every failure the wrapped fetcher reports is classified before the policy
/// sees it, so callers receive either a classified error or, when no rule
/// applies, the raw fetch error unchanged.
pub struct ResilientFetcher<F> {
    inner: F,
    policy: RetryPolicy,
    rules: ClassificationRules,
}

impl<F: BillingFetcher> ResilientFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            rules: ClassificationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostBucket>> {
        debug!(
            start = %query.window.start,
            end = %query.window.end,
            granularity = %query.granularity,
            "Fetching cost data"
        );

        let inner = &self.inner;
        let rules = &self.rules;
        self.policy
            .run(FETCH_OPERATION, move || async move {
                inner
                    .fetch(query)
                    .await
                    .map_err(|error| rules.to_error(error))
            })
            .await
    }
}
