//! Offline billing fetcher over recorded Cost Explorer responses
//!
//! Reads the JSON body of one or more `GetCostAndUsage` calls, i.e. a
//! document with a `ResultsByTime` array, and serves queries from it as if it
//! were the live API.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use spendlens_core::error::{FetchError, Result};
use spendlens_core::fetcher::BillingFetcher;
use spendlens_core::types::{CostBucket, CostGroup, CostMetric, CostQuery, MetricAmount};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordedResponse {
    results_by_time: Vec<RecordedResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordedResult {
    time_period: Option<RecordedPeriod>,
    #[serde(default)]
    groups: Vec<RecordedGroup>,
    #[serde(default)]
    total: BTreeMap<String, RecordedMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordedPeriod {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordedGroup {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    metrics: BTreeMap<String, RecordedMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordedMetric {
    amount: Decimal,
    #[serde(default)]
    unit: String,
}

/// [`BillingFetcher`] backed by a recorded response file
#[derive(Debug, Clone)]
pub struct JsonFileFetcher {
    path: PathBuf,
    buckets: Vec<CostBucket>,
}

impl JsonFileFetcher {
    /// Load and parse the recording at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let buckets = parse_results(&content)?;
        let undated = buckets.iter().filter(|b| b.period_start.is_none()).count();
        if undated > 0 {
            warn!(path = %path.display(), undated, "Recorded results without a time period are ignored");
        }
        debug!(path = %path.display(), buckets = buckets.len(), "Loaded recorded cost data");
        Ok(Self {
            path: path.to_path_buf(),
            buckets,
        })
    }

    /// Build a fetcher from already parsed buckets
    pub fn from_buckets(buckets: Vec<CostBucket>) -> Self {
        Self {
            path: PathBuf::new(),
            buckets,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BillingFetcher for JsonFileFetcher {
    /// Buckets starting inside the query window
    ///
    /// Undated buckets belong to no window and are never returned.
    async fn fetch(&self, query: &CostQuery) -> std::result::Result<Vec<CostBucket>, FetchError> {
        Ok(self
            .buckets
            .iter()
            .filter(|bucket| {
                bucket
                    .period_start
                    .is_some_and(|start| query.window.contains(start))
            })
            .cloned()
            .collect())
    }
}

/// Parse a `GetCostAndUsage` response body into buckets
///
/// Metrics spendlens does not track are dropped. An ungrouped result becomes
/// a single group without a dimension value.
pub fn parse_results(content: &str) -> Result<Vec<CostBucket>> {
    let response: RecordedResponse = serde_json::from_str(content)?;

    Ok(response
        .results_by_time
        .into_iter()
        .map(|result| {
            let (period_start, period_end) = result
                .time_period
                .map_or((None, None), |period| (period.start, period.end));

            let mut groups: Vec<CostGroup> = result
                .groups
                .into_iter()
                .map(|group| CostGroup {
                    dimension_value: group.keys.into_iter().next(),
                    metrics: convert_metrics(group.metrics),
                })
                .collect();

            if groups.is_empty() && !result.total.is_empty() {
                groups.push(CostGroup {
                    dimension_value: None,
                    metrics: convert_metrics(result.total),
                });
            }

            CostBucket {
                period_start,
                period_end,
                groups,
            }
        })
        .collect())
}

fn convert_metrics(raw: BTreeMap<String, RecordedMetric>) -> BTreeMap<CostMetric, MetricAmount> {
    raw.into_iter()
        .filter_map(|(name, metric)| {
            CostMetric::from_wire(&name).map(|m| (m, MetricAmount::new(metric.amount, metric.unit)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendlens_core::test_utils::{dec, ymd};
    use spendlens_core::window::calendar_month_window;

    const RECORDING: &str = r#"{
        "ResultsByTime": [
            {
                "TimePeriod": {"Start": "2024-02-29", "End": "2024-03-01"},
                "Groups": [
                    {"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "5.5", "Unit": "USD"}}}
                ],
                "Total": {},
                "Estimated": false
            },
            {
                "TimePeriod": {"Start": "2024-03-01", "End": "2024-03-02"},
                "Groups": [
                    {
                        "Keys": ["Amazon S3"],
                        "Metrics": {
                            "UnblendedCost": {"Amount": "1.25", "Unit": "USD"},
                            "UsageQuantity": {"Amount": "300", "Unit": "GB-Mo"},
                            "NormalizedUsageAmount": {"Amount": "1", "Unit": "N/A"}
                        }
                    },
                    {"Keys": [], "Metrics": {"UnblendedCost": {"Amount": "0.1", "Unit": "USD"}}}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_recording() {
        let buckets = parse_results(RECORDING).unwrap();
        assert_eq!(buckets.len(), 2);

        let march = &buckets[1];
        assert_eq!(march.period_start, Some(ymd(2024, 3, 1)));
        assert_eq!(march.groups[0].dimension_value.as_deref(), Some("Amazon S3"));
        assert_eq!(march.groups[0].metrics.len(), 2);
        assert_eq!(
            march.groups[0].metrics[&CostMetric::UnblendedCost].amount,
            dec("1.25")
        );
        assert_eq!(march.groups[1].dimension_or_unknown(), "Unknown");
    }

    #[test]
    fn test_ungrouped_totals_become_one_group() {
        let content = r#"{"ResultsByTime": [{
            "TimePeriod": {"Start": "2024-03-01", "End": "2024-03-02"},
            "Groups": [],
            "Total": {"BlendedCost": {"Amount": 9, "Unit": "USD"}}
        }]}"#;
        let buckets = parse_results(content).unwrap();
        assert_eq!(buckets[0].groups.len(), 1);
        assert_eq!(buckets[0].groups[0].dimension_value, None);
        assert_eq!(buckets[0].groups[0].metrics[&CostMetric::BlendedCost].amount, dec("9"));
    }

    #[test]
    fn test_malformed_recording_is_json_error() {
        let error = parse_results("{\"ResultsByTime\": 3}").unwrap_err();
        assert!(matches!(error, spendlens_core::SpendlensError::Json(_)));
    }

    #[tokio::test]
    async fn test_fetch_filters_to_window() {
        let fetcher = JsonFileFetcher::from_buckets(parse_results(RECORDING).unwrap());
        let query = CostQuery::new(calendar_month_window(2024, 3).unwrap());

        let buckets = fetcher.fetch(&query).await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].period_start, Some(ymd(2024, 3, 1)));
    }

    #[tokio::test]
    async fn test_undated_results_match_no_window() {
        let content = r#"{"ResultsByTime": [{
            "Groups": [{"Keys": ["Amazon EC2"], "Metrics": {"UnblendedCost": {"Amount": "7", "Unit": "USD"}}}]
        }]}"#;
        let fetcher = JsonFileFetcher::from_buckets(parse_results(content).unwrap());

        for month in [2, 3] {
            let query = CostQuery::new(calendar_month_window(2024, month).unwrap());
            assert!(fetcher.fetch(&query).await.unwrap().is_empty());
        }
    }

    #[test]
    fn test_open_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ce.json");
        std::fs::write(&path, RECORDING).unwrap();

        let fetcher = JsonFileFetcher::open(&path).unwrap();
        assert_eq!(fetcher.path(), path.as_path());
        assert!(JsonFileFetcher::open(dir.path().join("missing.json")).is_err());
    }
}
