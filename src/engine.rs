//! Cost analysis engine
//!
//! [`CostAnalyzer`] drives one report: it resolves windows, serves fetch
//! results from the cache when it can, falls back to the resilient fetcher,
//! and hands the buckets to the analysis functions.
//!
//! # Examples
//!
//! ```no_run
//! use spendlens::engine::CostAnalyzer;
//! use spendlens::fetcher::JsonFileFetcher;
//! use spendlens::cache::MemoryCache;
//! use spendlens::resilience::{ResilientFetcher, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> spendlens::Result<()> {
//!     let fetcher = JsonFileFetcher::open("cost-and-usage.json")?;
//!     let resilient = ResilientFetcher::new(fetcher, RetryPolicy::default());
//!     let mut analyzer = CostAnalyzer::new(resilient, MemoryCache::default());
//!
//!     let report = analyzer.overview_month(2024, 3).await?;
//!     println!("{} {}", report.total_cost, report.currency);
//!     Ok(())
//! }
//! ```

use crate::performance::PerformanceTracker;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use spendlens_analysis::{
    FocusLiteRecord, Signal, SignalThresholds, analyze, compare_months, cost_records_with,
    focus_lite_records, from_services, shared_metric,
};
use spendlens_cache::{CacheParams, CacheStore, DataType};
use spendlens_core::error::Result;
use spendlens_core::fetcher::BillingFetcher;
use spendlens_core::report_types::{AnalysisResult, ComparisonResult, CostReport, ReportType};
use spendlens_core::types::{CostBucket, CostMetric, CostQuery, TimeWindow};
use spendlens_core::window::{calendar_month_window, previous_period, rolling_window};
use spendlens_resilience::ResilientFetcher;
use tracing::{debug, info, warn};

/// Cache operation name for cost and usage fetches
pub const COST_AND_USAGE_OPERATION: &str = "get_cost_and_usage";

/// Fetch results for a window and the period before it
struct PeriodBuckets {
    window: TimeWindow,
    current: Vec<CostBucket>,
    previous: Vec<CostBucket>,
}

impl PeriodBuckets {
    fn analyze(&self, primary: Option<CostMetric>) -> AnalysisResult {
        let result = analyze(
            &cost_records_with(&self.current, primary),
            &cost_records_with(&self.previous, primary),
            &self.window,
        );
        info!(
            window = %result.window,
            total = %result.total_cost,
            services = result.service_totals.len(),
            metric = ?primary,
            "Analyzed cost window"
        );
        result
    }
}

/// Orchestrates window resolution, caching, fetching and analysis
pub struct CostAnalyzer<F, C> {
    fetcher: ResilientFetcher<F>,
    cache: C,
    today: Option<NaiveDate>,
    performance: PerformanceTracker,
}

impl<F: BillingFetcher, C: CacheStore> CostAnalyzer<F, C> {
    pub fn new(fetcher: ResilientFetcher<F>, cache: C) -> Self {
        Self {
            fetcher,
            cache,
            today: None,
            performance: PerformanceTracker::new(),
        }
    }

    /// Pin the date rolling windows end on instead of the current UTC date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn fetcher(&self) -> &ResilientFetcher<F> {
        &self.fetcher
    }

    pub fn performance(&self) -> &PerformanceTracker {
        &self.performance
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Buckets for `query`, from the cache when a fresh entry exists
    pub async fn fetch_buckets(&mut self, query: &CostQuery) -> Result<Vec<CostBucket>> {
        let params = query_params(query);

        if let Some(payload) = self
            .cache
            .get(COST_AND_USAGE_OPERATION, DataType::CostData, &params)
        {
            match serde_json::from_value::<Vec<CostBucket>>(payload) {
                Ok(buckets) => {
                    debug!(window = %query.window, buckets = buckets.len(), "Using cached cost data");
                    self.performance.record_cache_hit();
                    return Ok(buckets);
                }
                Err(e) => warn!(error = %e, "Ignoring undecodable cached cost data"),
            }
        }

        self.performance.record_api_call();
        let buckets = match self.fetcher.fetch(query).await {
            Ok(buckets) => buckets,
            Err(e) => {
                self.performance.record_error();
                return Err(e);
            }
        };
        self.cache.set(
            COST_AND_USAGE_OPERATION,
            serde_json::to_value(&buckets)?,
            DataType::CostData,
            &params,
        )?;
        Ok(buckets)
    }

    async fn fetch_periods(&mut self, window: TimeWindow) -> Result<PeriodBuckets> {
        let previous = previous_period(&window)?;
        let current = self.fetch_buckets(&CostQuery::new(window.clone())).await?;
        let previous = self.fetch_buckets(&CostQuery::new(previous)).await?;
        Ok(PeriodBuckets {
            window,
            current,
            previous,
        })
    }

    /// Analyze `window` against its previous period
    ///
    /// Both periods are costed with one primary metric.
    pub async fn analyze_window(&mut self, window: TimeWindow) -> Result<AnalysisResult> {
        let periods = self.fetch_periods(window).await?;
        let primary = shared_metric(&[periods.current.as_slice(), periods.previous.as_slice()]);
        Ok(periods.analyze(primary))
    }

    /// Overview of the last `days` days
    pub async fn overview_rolling(&mut self, days: i64) -> Result<CostReport> {
        let window = rolling_window(days, self.today())?;
        self.performance.start("overview");
        let analysis = self.analyze_window(window).await;
        self.performance.finish();
        Ok(CostReport::from_analysis(ReportType::CostOverview, analysis?))
    }

    /// Overview of one calendar month
    pub async fn overview_month(&mut self, year: i32, month: u32) -> Result<CostReport> {
        let window = calendar_month_window(year, month)?;
        self.performance.start("overview_month");
        let analysis = self.analyze_window(window).await;
        self.performance.finish();
        Ok(CostReport::from_analysis(ReportType::CostOverviewMonth, analysis?))
    }

    /// Report for `current` with a per-service comparison against `baseline`
    pub async fn compare_months(
        &mut self,
        current: (i32, u32),
        baseline: (i32, u32),
    ) -> Result<CostReport> {
        let current_window = calendar_month_window(current.0, current.1)?;
        let baseline_window = calendar_month_window(baseline.0, baseline.1)?;

        self.performance.start("compare_months");
        let compared = self.compare_windows(current_window, baseline_window).await;
        self.performance.finish();
        let (current_analysis, comparison) = compared?;

        Ok(CostReport::from_analysis(ReportType::CostOverviewMonth, current_analysis)
            .with_comparison(comparison))
    }

    async fn compare_windows(
        &mut self,
        current: TimeWindow,
        baseline: TimeWindow,
    ) -> Result<(AnalysisResult, ComparisonResult)> {
        let current = self.fetch_periods(current).await?;
        let baseline = self.fetch_periods(baseline).await?;

        // all four periods are costed alike so both the trends and the deltas compare like with like
        let primary = shared_metric(&[
            current.current.as_slice(),
            current.previous.as_slice(),
            baseline.current.as_slice(),
            baseline.previous.as_slice(),
        ]);
        let current_analysis = current.analyze(primary);
        let baseline_analysis = baseline.analyze(primary);
        let comparison = compare_months(&current_analysis, &baseline_analysis);
        Ok((current_analysis, comparison))
    }

    /// FOCUS-lite rows for the last `days` days
    pub async fn export_focus(&mut self, days: i64) -> Result<Vec<FocusLiteRecord>> {
        let window = rolling_window(days, self.today())?;
        self.performance.start("export");
        let buckets = self.fetch_buckets(&CostQuery::new(window.clone())).await;
        self.performance.finish();
        Ok(focus_lite_records(&buckets?, &window))
    }

    /// Decision signals for the last `days` days
    pub async fn signals_rolling(
        &mut self,
        days: i64,
        thresholds: &SignalThresholds,
    ) -> Result<Vec<Signal>> {
        let window = rolling_window(days, self.today())?;
        self.signals_for(window, thresholds).await
    }

    /// Decision signals for one calendar month
    pub async fn signals_month(
        &mut self,
        year: i32,
        month: u32,
        thresholds: &SignalThresholds,
    ) -> Result<Vec<Signal>> {
        let window = calendar_month_window(year, month)?;
        self.signals_for(window, thresholds).await
    }

    async fn signals_for(
        &mut self,
        window: TimeWindow,
        thresholds: &SignalThresholds,
    ) -> Result<Vec<Signal>> {
        self.performance.start("signals");
        let analysis = self.analyze_window(window).await;
        self.performance.finish();
        let analysis = analysis?;
        Ok(from_services(
            &analysis.service_breakdown,
            &analysis.window.label,
            thresholds,
        ))
    }
}

/// Cache parameters identifying a cost query
pub fn query_params(query: &CostQuery) -> CacheParams {
    let metrics: Vec<&str> = query.metrics.iter().map(|metric| metric.as_str()).collect();
    CacheParams::new()
        .with("start", query.window.start.to_string())
        .with("end", query.window.end.to_string())
        .with("granularity", query.granularity.to_string())
        .with("group_by", json!(query.group_by))
        .with("metrics", json!(metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_cache::{MemoryCache, NoopCache};
    use spendlens_core::error::{ErrorKind, FetchError};
    use spendlens_core::report_types::TrendDirection;
    use spendlens_analysis::signals::SignalId;
    use spendlens_core::test_utils::{ScriptedFetcher, bucket_with_metric, daily_bucket, dec, ymd};
    use spendlens_core::types::CostGroup;
    use spendlens_resilience::RetryPolicy;
    use std::time::Duration;

    fn resilient(fetcher: ScriptedFetcher) -> ResilientFetcher<ScriptedFetcher> {
        ResilientFetcher::new(
            fetcher,
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    #[tokio::test]
    async fn test_second_fetch_is_served_from_cache() {
        let buckets = vec![daily_bucket(ymd(2024, 3, 1), &[("EC2", "10")])];
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(buckets.clone())]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());
        let query = CostQuery::new(calendar_month_window(2024, 3).unwrap());

        assert_eq!(analyzer.fetch_buckets(&query).await.unwrap(), buckets);
        assert_eq!(analyzer.fetch_buckets(&query).await.unwrap(), buckets);
        assert_eq!(analyzer.fetcher().inner().calls(), 1);
        assert_eq!(analyzer.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_noop_cache_always_fetches() {
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(vec![])]));
        let mut analyzer = CostAnalyzer::new(fetcher, NoopCache::default());
        let query = CostQuery::new(calendar_month_window(2024, 3).unwrap());

        analyzer.fetch_buckets(&query).await.unwrap();
        analyzer.fetch_buckets(&query).await.unwrap();
        assert_eq!(analyzer.fetcher().inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_rolling_overview_fetches_both_periods() {
        let current = vec![daily_bucket(ymd(2024, 6, 5), &[("EC2", "1200")])];
        let previous = vec![daily_bucket(ymd(2024, 5, 28), &[("EC2", "1000")])];
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(current), Ok(previous)]));
        let mut analyzer =
            CostAnalyzer::new(fetcher, MemoryCache::default()).with_today(ymd(2024, 6, 8));

        let report = analyzer.overview_rolling(7).await.unwrap();
        assert_eq!(report.report_type, ReportType::CostOverview);
        assert_eq!(report.window_start, ymd(2024, 6, 1));
        assert_eq!(report.window_end, ymd(2024, 6, 8));
        assert_eq!(report.trend.change_amount, dec("200"));
        assert_eq!(report.trend.change_percentage, 20.0);
        assert_eq!(report.trend.direction, TrendDirection::Up);

        let queries = analyzer.fetcher().inner().queries();
        assert_eq!(queries[1].window.start, ymd(2024, 5, 25));
        assert_eq!(queries[1].window.end, ymd(2024, 6, 1));
    }

    #[tokio::test]
    async fn test_invalid_month_never_fetches() {
        let fetcher = resilient(ScriptedFetcher::new(vec![]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());

        let error = analyzer.overview_month(2024, 13).await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::Validation));
        assert_eq!(analyzer.fetcher().inner().calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let fetcher = resilient(ScriptedFetcher::new(vec![
            Err(FetchError::api("AccessDeniedException", "not authorized")),
            Ok(vec![]),
        ]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());
        let query = CostQuery::new(calendar_month_window(2024, 3).unwrap());

        let error = analyzer.fetch_buckets(&query).await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::Permission));
        assert_eq!(analyzer.cache().stats().entries, 0);

        analyzer.fetch_buckets(&query).await.unwrap();
        assert_eq!(analyzer.cache().stats().entries, 1);
    }

    #[tokio::test]
    async fn test_both_periods_costed_with_one_metric() {
        // March only reports BlendedCost; February reports both
        let current = vec![bucket_with_metric(ymd(2024, 3, 1), CostMetric::BlendedCost, &[("EC2", "100")])];
        let mut february = daily_bucket(ymd(2024, 2, 1), &[]);
        february.groups.push(
            CostGroup::new("EC2")
                .with_metric(CostMetric::UnblendedCost, dec("70"), "USD")
                .with_metric(CostMetric::BlendedCost, dec("90"), "USD"),
        );
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(current), Ok(vec![february])]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());

        let report = analyzer.overview_month(2024, 3).await.unwrap();
        assert_eq!(report.trend.previous_period_cost, dec("90"));
        assert_eq!(report.trend.change_amount, dec("10"));
    }

    #[tokio::test]
    async fn test_compared_months_costed_with_one_metric() {
        let mut march = daily_bucket(ymd(2024, 3, 1), &[]);
        march.groups.push(
            CostGroup::new("EC2")
                .with_metric(CostMetric::UnblendedCost, dec("100"), "USD")
                .with_metric(CostMetric::BlendedCost, dec("110"), "USD"),
        );
        let january = bucket_with_metric(ymd(2024, 1, 1), CostMetric::BlendedCost, &[("EC2", "90")]);
        // March, February, January, December
        let fetcher = resilient(ScriptedFetcher::new(vec![
            Ok(vec![march]),
            Ok(vec![]),
            Ok(vec![january]),
            Ok(vec![]),
        ]));
        let mut analyzer = CostAnalyzer::new(fetcher, NoopCache::default());

        let report = analyzer.compare_months((2024, 3), (2024, 1)).await.unwrap();
        assert_eq!(report.total_cost, dec("110"));
        let comparison = report.comparison.unwrap();
        assert_eq!(comparison.service_deltas[0].baseline_cost, dec("90"));
        assert_eq!(comparison.total_delta, dec("20"));
    }

    #[tokio::test]
    async fn test_operations_are_timed_and_counted() {
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(vec![])]));
        let mut analyzer =
            CostAnalyzer::new(fetcher, MemoryCache::default()).with_today(ymd(2024, 6, 8));

        analyzer.overview_rolling(7).await.unwrap();
        analyzer.overview_rolling(7).await.unwrap();

        let operations = analyzer.performance().operations();
        assert_eq!(operations.len(), 2);
        assert_eq!(operations[0].name, "overview");
        assert_eq!(operations[0].api_calls, 2);
        assert_eq!(operations[1].cache_hits, 2);
        assert_eq!(analyzer.performance().summary().cache_efficiency, 50.0);
    }

    #[tokio::test]
    async fn test_failed_fetch_counts_as_error() {
        let fetcher = resilient(ScriptedFetcher::new(vec![Err(FetchError::api(
            "AccessDeniedException",
            "not authorized",
        ))]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());

        assert!(analyzer.overview_month(2024, 3).await.is_err());
        let summary = analyzer.performance().summary();
        assert_eq!(summary.total_operations, 1);
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn test_signals_for_month() {
        let current = vec![daily_bucket(ymd(2024, 3, 1), &[("EC2", "1500")])];
        let previous = vec![daily_bucket(ymd(2024, 2, 1), &[("EC2", "1000")])];
        let fetcher = resilient(ScriptedFetcher::new(vec![Ok(current), Ok(previous)]));
        let mut analyzer = CostAnalyzer::new(fetcher, MemoryCache::default());

        let signals = analyzer
            .signals_month(2024, 3, &SignalThresholds::default())
            .await
            .unwrap();
        let ids: Vec<SignalId> = signals.iter().map(|signal| signal.id).collect();
        assert_eq!(
            ids,
            vec![
                SignalId::ConcentrationRisk,
                SignalId::SpikeDrivers,
                SignalId::RisingWatchlist
            ]
        );
        assert!(signals[0].title.contains("EC2 is 100.0%"));
    }

    #[test]
    fn test_query_params_distinguish_windows() {
        let march = query_params(&CostQuery::new(calendar_month_window(2024, 3).unwrap()));
        let april = query_params(&CostQuery::new(calendar_month_window(2024, 4).unwrap()));
        assert_ne!(march, april);
        assert!(march.canonical().contains("\"granularity\":\"DAILY\""));
    }
}
