//! FOCUS-lite normalization
//!
//! Flattens a fetch result into provider-neutral rows loosely following the
//! FinOps FOCUS column set. Rows are service-level only: resource ids and
//! environments are not resolved yet.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spendlens_core::types::{CostBucket, CostMetric, DEFAULT_CURRENCY, TimeWindow};

use crate::aggregation::{group_cost, preferred_metric};

/// One normalized cost row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusLiteRecord {
    pub provider: String,
    pub service: String,
    pub resource_id: Option<String>,
    pub environment: String,
    pub cost: Decimal,
    pub currency: String,
    pub usage_amount: Option<Decimal>,
    pub usage_unit: Option<String>,
    pub time_window_start: NaiveDate,
    pub time_window_end: NaiveDate,
    pub allocation_method: String,
    pub allocation_confidence: String,
}

/// Normalize `buckets` into FOCUS-lite rows
///
/// Buckets without reported dates inherit the bounds of `window`. Each group
/// is costed the same way as in aggregation; only usage-only groups carry a
/// zero cost.
pub fn focus_lite_records(buckets: &[CostBucket], window: &TimeWindow) -> Vec<FocusLiteRecord> {
    let metric = preferred_metric(buckets);

    buckets
        .iter()
        .flat_map(|bucket| {
            let start = bucket.period_start.unwrap_or(window.start);
            let end = bucket.period_end.unwrap_or(window.end);

            bucket.groups.iter().map(move |group| {
                let cost = group_cost(group, metric).map(|(_, value)| value);
                let usage = group.metrics.get(&CostMetric::UsageQuantity);

                FocusLiteRecord {
                    provider: "aws".to_string(),
                    service: group.dimension_or_unknown().to_string(),
                    resource_id: None,
                    environment: "unknown".to_string(),
                    cost: cost.map(|value| value.amount).unwrap_or(Decimal::ZERO),
                    currency: cost
                        .map(|value| value.unit.clone())
                        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                    usage_amount: usage.map(|value| value.amount),
                    usage_unit: usage.map(|value| value.unit.clone()),
                    time_window_start: start,
                    time_window_end: end,
                    allocation_method: "direct".to_string(),
                    allocation_confidence: "medium".to_string(),
                }
            })
        })
        .collect()
}
