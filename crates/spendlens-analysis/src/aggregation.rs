//! Aggregation module for summarizing fetch results
//!
//! This module turns raw time-bucketed groups into period totals, per-service
//! totals and breakdowns, and computes the [`CostTrend`] between a period and
//! the one before it.
//!
//! # Metric selection
//!
//! A fetch result may carry several cost metrics per group (for example both
//! `UnblendedCost` and `BlendedCost`). They describe the same spend in
//! different ways, so summing them would double count. Each group is valued
//! with exactly one metric:
//!
//! 1. [`shared_metric`] picks a primary metric over every bucket set being
//!    compared: the highest-priority metric all cost-reporting groups carry,
//!    or failing that the highest-priority metric any group carries.
//! 2. A group reporting the primary metric is valued with it. Any other
//!    group falls back to its own highest-priority cost metric, so its spend
//!    is never dropped.
//!
//! # Examples
//!
//! ```
//! use spendlens_analysis::aggregation::{aggregate_total, cost_records, trend};
//! use spendlens_core::report_types::TrendDirection;
//! use spendlens_core::types::{CostBucket, CostGroup, CostMetric};
//! use rust_decimal::Decimal;
//!
//! let buckets = vec![CostBucket {
//!     period_start: None,
//!     period_end: None,
//!     groups: vec![
//!         CostGroup::new("Amazon EC2").with_metric(CostMetric::UnblendedCost, Decimal::new(1200, 0), "USD"),
//!     ],
//! }];
//!
//! let total = aggregate_total(&cost_records(&buckets));
//! let change = trend(total, Decimal::new(1000, 0));
//! assert_eq!(change.change_amount, Decimal::new(200, 0));
//! assert_eq!(change.direction, TrendDirection::Up);
//! ```

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use spendlens_core::report_types::{AnalysisResult, CostTrend, ServiceBreakdown, TrendDirection};
use spendlens_core::types::{
    CostBucket, CostGroup, CostMetric, CostRecord, DEFAULT_CURRENCY, MetricAmount, TimeWindow,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Number of services kept in an analysis breakdown
pub const TOP_SERVICES: usize = 10;

/// Primary cost metric for a single fetch result
pub fn preferred_metric(buckets: &[CostBucket]) -> Option<CostMetric> {
    shared_metric(&[buckets])
}

/// Primary cost metric across several fetch results
///
/// Periods that are compared with each other must be valued with the same
/// primary metric, so callers pass every bucket set of one analysis here.
pub fn shared_metric(bucket_sets: &[&[CostBucket]]) -> Option<CostMetric> {
    let groups: Vec<&CostGroup> = bucket_sets
        .iter()
        .flat_map(|buckets| buckets.iter())
        .flat_map(|bucket| &bucket.groups)
        .filter(|group| group_cost(group, None).is_some())
        .collect();

    let carried_by_all = |metric: &CostMetric| {
        !groups.is_empty() && groups.iter().all(|group| group.metrics.contains_key(metric))
    };
    let carried_by_any =
        |metric: &CostMetric| groups.iter().any(|group| group.metrics.contains_key(metric));

    CostMetric::COST_PRIORITY
        .into_iter()
        .find(carried_by_all)
        .or_else(|| CostMetric::COST_PRIORITY.into_iter().find(carried_by_any))
}

/// Metric and value `group` is costed with
///
/// `primary` when the group reports it, otherwise the group's own
/// highest-priority cost metric. `None` for groups without any cost metric.
pub fn group_cost(
    group: &CostGroup,
    primary: Option<CostMetric>,
) -> Option<(CostMetric, &MetricAmount)> {
    primary
        .into_iter()
        .chain(CostMetric::COST_PRIORITY)
        .find_map(|metric| group.metrics.get(&metric).map(|value| (metric, value)))
}

/// Flatten a fetch result into one record per group per bucket
pub fn cost_records(buckets: &[CostBucket]) -> Vec<CostRecord> {
    cost_records_with(buckets, preferred_metric(buckets))
}

/// Flatten a fetch result, costing groups with `primary` where they report it
///
/// Groups without any cost metric (usage-only rows) produce no record.
pub fn cost_records_with(buckets: &[CostBucket], primary: Option<CostMetric>) -> Vec<CostRecord> {
    debug!(
        metric = ?primary,
        buckets = buckets.len(),
        "Selected primary cost metric"
    );

    let mut records = Vec::new();
    for bucket in buckets {
        for group in &bucket.groups {
            let Some((metric, value)) = group_cost(group, primary) else {
                continue;
            };
            if Some(metric) != primary {
                debug!(
                    group = group.dimension_or_unknown(),
                    metric = %metric,
                    "Group lacks primary metric, using its own"
                );
            }
            records.push(CostRecord {
                dimension_value: group.dimension_or_unknown().to_string(),
                amount: value.amount,
                currency: value.unit.clone(),
            });
        }
    }
    records
}

/// Sum of all record amounts
pub fn aggregate_total(records: &[CostRecord]) -> Decimal {
    records.iter().map(|record| record.amount).sum()
}

/// Sum of record amounts per dimension value
pub fn aggregate_by_service(records: &[CostRecord]) -> BTreeMap<String, Decimal> {
    let mut totals = BTreeMap::new();
    for record in records {
        *totals
            .entry(record.dimension_value.clone())
            .or_insert(Decimal::ZERO) += record.amount;
    }
    totals
}

/// Per-service breakdown of the current period, largest first
///
/// Services only present in `previous` are not listed; they have no current
/// spend to break down.
pub fn breakdown(
    current: &BTreeMap<String, Decimal>,
    previous: &BTreeMap<String, Decimal>,
    days: i64,
) -> Vec<ServiceBreakdown> {
    let total_current: Decimal = current.values().copied().sum();

    let mut rows: Vec<ServiceBreakdown> = current
        .iter()
        .map(|(name, &cost)| {
            let previous_cost = previous.get(name).copied().unwrap_or(Decimal::ZERO);
            let percentage_of_total = if total_current > Decimal::ZERO {
                to_f64(cost / total_current * Decimal::ONE_HUNDRED)
            } else {
                0.0
            };

            ServiceBreakdown {
                name: name.clone(),
                total_cost: cost,
                percentage_of_total,
                daily_average: daily_average(cost, days),
                trend: trend(cost, previous_cost),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_cost
            .cmp(&a.total_cost)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Change from `previous` to `current`
///
/// A zero baseline with new spend reads as +100%; two zero periods read as
/// 0% and stable. Direction is a strict comparison of the two amounts.
pub fn trend(current: Decimal, previous: Decimal) -> CostTrend {
    let change_amount = current - previous;

    let direction = match current.cmp(&previous) {
        Ordering::Greater => TrendDirection::Up,
        Ordering::Less => TrendDirection::Down,
        Ordering::Equal => TrendDirection::Stable,
    };

    CostTrend {
        current_period_cost: current,
        previous_period_cost: previous,
        change_amount,
        change_percentage: percent_change(current, previous),
        direction,
    }
}

/// Percentage change of `current` against `baseline`, zero-baseline aware
pub fn percent_change(current: Decimal, baseline: Decimal) -> f64 {
    if baseline > Decimal::ZERO {
        to_f64((current - baseline) / baseline * Decimal::ONE_HUNDRED)
    } else if current > Decimal::ZERO {
        100.0
    } else {
        0.0
    }
}

/// Analyze one window against its previous period
pub fn analyze(
    current: &[CostRecord],
    previous: &[CostRecord],
    window: &TimeWindow,
) -> AnalysisResult {
    let current_services = aggregate_by_service(current);
    let previous_services = aggregate_by_service(previous);
    let total_cost = aggregate_total(current);
    let previous_total = aggregate_total(previous);

    let mut service_breakdown = breakdown(&current_services, &previous_services, window.days);
    service_breakdown.truncate(TOP_SERVICES);

    let currency = current
        .first()
        .or_else(|| previous.first())
        .map(|record| record.currency.clone())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    debug!(
        window = %window,
        services = current_services.len(),
        total = %total_cost,
        "Analyzed cost window"
    );

    AnalysisResult {
        window: window.clone(),
        period_days: window.days,
        total_cost,
        daily_average: daily_average(total_cost, window.days),
        trend: trend(total_cost, previous_total),
        service_breakdown,
        currency,
        generated_at: Utc::now(),
        service_totals: current_services,
    }
}

fn daily_average(cost: Decimal, days: i64) -> Decimal {
    if days > 0 {
        cost / Decimal::from(days)
    } else {
        Decimal::ZERO
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
