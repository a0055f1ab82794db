//! Report data types for spendlens
//!
//! Pure data structures produced by the analysis engine and handed to the
//! output formatters. These types have no dependencies on fetchers or caches.

use crate::types::TimeWindow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Direction of a period-over-period change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// Change between a period and the period before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTrend {
    pub current_period_cost: Decimal,
    pub previous_period_cost: Decimal,
    pub change_amount: Decimal,
    pub change_percentage: f64,
    pub direction: TrendDirection,
}

/// One service's share of a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceBreakdown {
    pub name: String,
    pub total_cost: Decimal,
    pub percentage_of_total: f64,
    pub daily_average: Decimal,
    pub trend: CostTrend,
}

/// Aggregated view of one window compared with its previous period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub window: TimeWindow,
    pub period_days: i64,
    pub total_cost: Decimal,
    pub daily_average: Decimal,
    pub trend: CostTrend,
    /// Top services by cost
    pub service_breakdown: Vec<ServiceBreakdown>,
    pub currency: String,
    pub generated_at: DateTime<Utc>,
    /// Every service's total for the window, not just the top entries
    #[serde(default, skip_serializing)]
    pub service_totals: BTreeMap<String, Decimal>,
}

/// Per-service row of a month-over-month comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDelta {
    pub service_name: String,
    pub current_cost: Decimal,
    pub baseline_cost: Decimal,
    pub delta: Decimal,
    pub delta_percentage: f64,
}

/// Comparison of a current period against a baseline period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub current_window: TimeWindow,
    pub baseline_window: TimeWindow,
    /// Ordered by absolute delta, largest first
    pub service_deltas: Vec<ServiceDelta>,
    pub total_delta: Decimal,
    pub total_delta_percentage: f64,
}

/// Kind of report carried by a [`CostReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    CostOverview,
    CostOverviewMonth,
    CostCompareMonths,
}

/// Result structure exposed to formatters and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub report_type: ReportType,
    pub period_days: i64,
    pub total_cost: Decimal,
    pub daily_average: Decimal,
    pub trend: CostTrend,
    pub service_breakdown: Vec<ServiceBreakdown>,
    pub currency: String,
    pub generated_at: DateTime<Utc>,
    pub window: TimeWindow,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comparison: Option<ComparisonResult>,
}

impl CostReport {
    pub fn from_analysis(report_type: ReportType, analysis: AnalysisResult) -> Self {
        Self {
            report_type,
            period_days: analysis.period_days,
            total_cost: analysis.total_cost,
            daily_average: analysis.daily_average,
            trend: analysis.trend,
            service_breakdown: analysis.service_breakdown,
            currency: analysis.currency,
            generated_at: analysis.generated_at,
            window_start: analysis.window.start,
            window_end: analysis.window.end,
            window: analysis.window,
            comparison: None,
        }
    }

    pub fn with_comparison(mut self, comparison: ComparisonResult) -> Self {
        self.report_type = ReportType::CostCompareMonths;
        self.comparison = Some(comparison);
        self
    }
}
