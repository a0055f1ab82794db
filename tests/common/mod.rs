//! Common test utilities for spendlens integration tests
//!
//! Builds recorded Cost Explorer responses on disk and wires analyzers over
//! them with a file cache rooted in a temporary directory.

use chrono::{Duration, NaiveDate};
use serde_json::{Value, json};
use spendlens::{
    cache::{CacheConfig, FileCache},
    engine::CostAnalyzer,
    fetcher::JsonFileFetcher,
    resilience::{ResilientFetcher, RetryPolicy},
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a `GetCostAndUsage` response body
#[derive(Default)]
pub struct RecordingBuilder {
    results: Vec<Value>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one daily result with an `UnblendedCost` group per service
    pub fn day(mut self, date: NaiveDate, services: &[(&str, &str)]) -> Self {
        let groups: Vec<Value> = services
            .iter()
            .map(|(service, amount)| {
                json!({
                    "Keys": [service],
                    "Metrics": {
                        "UnblendedCost": {"Amount": amount, "Unit": "USD"},
                        "BlendedCost": {"Amount": "999", "Unit": "USD"},
                        "UsageQuantity": {"Amount": "24", "Unit": "Hrs"}
                    }
                })
            })
            .collect();

        self.results.push(json!({
            "TimePeriod": {
                "Start": date.to_string(),
                "End": (date + Duration::days(1)).to_string()
            },
            "Groups": groups,
            "Total": {},
            "Estimated": false
        }));
        self
    }

    /// Add a result without a `TimePeriod`
    pub fn undated(mut self, services: &[(&str, &str)]) -> Self {
        let groups: Vec<Value> = services
            .iter()
            .map(|(service, amount)| {
                json!({
                    "Keys": [service],
                    "Metrics": {"UnblendedCost": {"Amount": amount, "Unit": "USD"}}
                })
            })
            .collect();
        self.results.push(json!({"Groups": groups}));
        self
    }

    pub fn to_json(&self) -> String {
        json!({"ResultsByTime": self.results}).to_string()
    }

    /// Write the recording into `dir` and return its path
    pub fn write(&self, dir: &Path) -> PathBuf {
        let path = dir.join("cost-and-usage.json");
        std::fs::write(&path, self.to_json()).unwrap();
        path
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Workspace holding a recording and a cache directory
pub struct Fixture {
    pub dir: TempDir,
    pub recording: PathBuf,
}

impl Fixture {
    pub fn new(recording: &RecordingBuilder) -> Self {
        let dir = TempDir::new().unwrap();
        let recording = recording.write(dir.path());
        Self { dir, recording }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// A fresh analyzer, as a new process invocation would build it
    pub fn analyzer(&self, today: NaiveDate) -> CostAnalyzer<JsonFileFetcher, FileCache> {
        let fetcher = JsonFileFetcher::open(&self.recording).unwrap();
        let cache = FileCache::open(self.cache_dir(), CacheConfig::default()).unwrap();
        CostAnalyzer::new(ResilientFetcher::new(fetcher, RetryPolicy::no_retry()), cache)
            .with_today(today)
    }
}
