//! Core domain types for spendlens
//!
//! This module contains the fundamental types passed between the window
//! resolver, the billing data fetcher, and the analysis engine. Amounts are
//! carried as [`Decimal`] so sums over thousands of daily buckets do not
//! drift the way binary floats would.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Currency assumed when a fetch result carries no cost rows
pub const DEFAULT_CURRENCY: &str = "USD";

/// Label used for groups whose dimension value is missing
pub const UNKNOWN_DIMENSION: &str = "Unknown";

/// How a [`TimeWindow`] was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Last N days ending today
    Rolling,
    /// A single `YYYY-MM` month
    CalendarMonth,
}

/// Half-open date interval `[start, end)` over which costs are aggregated
///
/// Windows are built by the resolver functions in [`crate::window`], which
/// guarantee `end > start` and `days == end - start`.
///
/// # Examples
/// ```
/// use spendlens_core::window::calendar_month_window;
///
/// let window = calendar_month_window(2025, 12).unwrap();
/// assert_eq!(window.end.to_string(), "2026-01-01");
/// assert_eq!(window.days, 31);
/// assert_eq!(window.label, "2025-12");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First day of the window (inclusive)
    pub start: NaiveDate,
    /// Day after the last day of the window (exclusive)
    pub end: NaiveDate,
    /// Number of days covered
    pub days: i64,
    /// Rolling or calendar month
    pub kind: WindowKind,
    /// Display label, `YYYY-MM` or `last N days`
    pub label: String,
}

impl TimeWindow {
    /// Whether a date falls inside `[start, end)`
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {})", self.label, self.start, self.end)
    }
}

/// Bucket size requested from the fetcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    #[default]
    Daily,
    Monthly,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "DAILY"),
            Self::Monthly => write!(f, "MONTHLY"),
        }
    }
}

/// Metrics the billing API can report per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CostMetric {
    UnblendedCost,
    BlendedCost,
    AmortizedCost,
    NetUnblendedCost,
    NetAmortizedCost,
    UsageQuantity,
}

impl CostMetric {
    /// Cost metrics from most to least preferred
    ///
    /// When a result carries several cost metrics only the first one present
    /// is used; they are never summed together.
    pub const COST_PRIORITY: [CostMetric; 5] = [
        CostMetric::UnblendedCost,
        CostMetric::BlendedCost,
        CostMetric::AmortizedCost,
        CostMetric::NetUnblendedCost,
        CostMetric::NetAmortizedCost,
    ];

    /// Wire name used by the billing API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnblendedCost => "UnblendedCost",
            Self::BlendedCost => "BlendedCost",
            Self::AmortizedCost => "AmortizedCost",
            Self::NetUnblendedCost => "NetUnblendedCost",
            Self::NetAmortizedCost => "NetAmortizedCost",
            Self::UsageQuantity => "UsageQuantity",
        }
    }

    /// Parse a wire name, returning `None` for metrics spendlens does not track
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "UnblendedCost" => Some(Self::UnblendedCost),
            "BlendedCost" => Some(Self::BlendedCost),
            "AmortizedCost" => Some(Self::AmortizedCost),
            "NetUnblendedCost" => Some(Self::NetUnblendedCost),
            "NetAmortizedCost" => Some(Self::NetAmortizedCost),
            "UsageQuantity" => Some(Self::UsageQuantity),
            _ => None,
        }
    }

    /// Whether the metric is a monetary amount
    pub fn is_cost(&self) -> bool {
        !matches!(self, Self::UsageQuantity)
    }
}

impl fmt::Display for CostMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single metric value with its unit (currency code for cost metrics)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAmount {
    pub amount: Decimal,
    pub unit: String,
}

impl MetricAmount {
    pub fn new(amount: Decimal, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }
}

/// One group (e.g. one service) inside a time bucket
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostGroup {
    /// Value of the group-by dimension, `None` when the API omitted it
    pub dimension_value: Option<String>,
    /// Metric values reported for this group
    pub metrics: BTreeMap<CostMetric, MetricAmount>,
}

impl CostGroup {
    pub fn new(dimension_value: impl Into<String>) -> Self {
        Self {
            dimension_value: Some(dimension_value.into()),
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style metric insertion
    pub fn with_metric(mut self, metric: CostMetric, amount: Decimal, unit: &str) -> Self {
        self.metrics.insert(metric, MetricAmount::new(amount, unit));
        self
    }

    /// Dimension value, or [`UNKNOWN_DIMENSION`] when missing or blank
    pub fn dimension_or_unknown(&self) -> &str {
        match self.dimension_value.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => UNKNOWN_DIMENSION,
        }
    }
}

/// One time bucket of a fetch result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CostBucket {
    /// Bucket start (inclusive), when the API reported it
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    /// Bucket end (exclusive), when the API reported it
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    pub groups: Vec<CostGroup>,
}

/// A normalized cost row: one group in one bucket, valued with a single metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRecord {
    pub dimension_value: String,
    pub amount: Decimal,
    pub currency: String,
}

/// Parameters of one billing data request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQuery {
    pub window: TimeWindow,
    pub granularity: Granularity,
    /// Dimensions to group by, e.g. `SERVICE`
    pub group_by: Vec<String>,
    pub metrics: Vec<CostMetric>,
}

impl CostQuery {
    /// Daily, per-service query with the default metric set
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            granularity: Granularity::Daily,
            group_by: vec!["SERVICE".to_string()],
            metrics: vec![
                CostMetric::UnblendedCost,
                CostMetric::BlendedCost,
                CostMetric::UsageQuantity,
            ],
        }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn with_group_by(mut self, dimension: impl Into<String>) -> Self {
        self.group_by = vec![dimension.into()];
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<CostMetric>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_fallback() {
        assert_eq!(CostGroup::new("Amazon EC2").dimension_or_unknown(), "Amazon EC2");
        assert_eq!(CostGroup::default().dimension_or_unknown(), "Unknown");
        assert_eq!(CostGroup::new("  ").dimension_or_unknown(), "Unknown");
    }

    #[test]
    fn test_metric_wire_names() {
        for metric in CostMetric::COST_PRIORITY {
            assert_eq!(CostMetric::from_wire(metric.as_str()), Some(metric));
            assert!(metric.is_cost());
        }
        assert!(!CostMetric::UsageQuantity.is_cost());
        assert_eq!(CostMetric::from_wire("NormalizedUsageAmount"), None);
    }

    #[test]
    fn test_query_defaults() {
        let window = crate::window::calendar_month_window(2024, 3).unwrap();
        let query = CostQuery::new(window);
        assert_eq!(query.granularity, Granularity::Daily);
        assert_eq!(query.group_by, vec!["SERVICE".to_string()]);
        assert_eq!(query.metrics.len(), 3);
        assert_eq!(Granularity::Monthly.to_string(), "MONTHLY");
    }

    #[test]
    fn test_window_kind_serialization() {
        let json = serde_json::to_string(&WindowKind::CalendarMonth).unwrap();
        assert_eq!(json, "\"calendar_month\"");
    }
}
