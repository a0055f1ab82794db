//! Operation timing and API call accounting
//!
//! [`PerformanceTracker`] records how long each engine operation took and how
//! many billing API calls, cache hits and errors it saw. The summary is logged
//! at debug level, so `--verbose` shows it.

use std::time::{Duration, Instant};
use tracing::debug;

/// Counters for one engine operation
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub name: String,
    started: Instant,
    pub duration: Option<Duration>,
    pub api_calls: u64,
    pub cache_hits: u64,
    pub errors: u64,
}

/// Totals across every recorded operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub total_operations: usize,
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub api_calls: u64,
    pub cache_hits: u64,
    pub errors: u64,
    /// Share of lookups served from the cache, in percent
    pub cache_efficiency: f64,
}

/// Tracks the operation in progress and every finished one
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    operations: Vec<OperationMetrics>,
    current: Option<usize>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin timing `name`, finishing any operation still open
    pub fn start(&mut self, name: &str) {
        self.finish();
        self.operations.push(OperationMetrics {
            name: name.to_string(),
            started: Instant::now(),
            duration: None,
            api_calls: 0,
            cache_hits: 0,
            errors: 0,
        });
        self.current = Some(self.operations.len() - 1);
    }

    /// Stop timing the current operation
    pub fn finish(&mut self) {
        let Some(index) = self.current.take() else {
            return;
        };
        let operation = &mut self.operations[index];
        let elapsed = operation.started.elapsed();
        operation.duration = Some(elapsed);
        debug!(
            operation = %operation.name,
            duration_ms = elapsed.as_millis() as u64,
            api_calls = operation.api_calls,
            cache_hits = operation.cache_hits,
            errors = operation.errors,
            "Operation finished"
        );
    }

    pub fn record_api_call(&mut self) {
        if let Some(operation) = self.current_mut() {
            operation.api_calls += 1;
        }
    }

    pub fn record_cache_hit(&mut self) {
        if let Some(operation) = self.current_mut() {
            operation.cache_hits += 1;
        }
    }

    pub fn record_error(&mut self) {
        if let Some(operation) = self.current_mut() {
            operation.errors += 1;
        }
    }

    pub fn operations(&self) -> &[OperationMetrics] {
        &self.operations
    }

    pub fn summary(&self) -> PerformanceSummary {
        if self.operations.is_empty() {
            return PerformanceSummary::default();
        }

        let total_duration: Duration = self.operations.iter().filter_map(|op| op.duration).sum();
        let api_calls = self.operations.iter().map(|op| op.api_calls).sum();
        let cache_hits = self.operations.iter().map(|op| op.cache_hits).sum();
        let lookups = api_calls + cache_hits;

        PerformanceSummary {
            total_operations: self.operations.len(),
            total_duration,
            average_duration: total_duration / self.operations.len() as u32,
            api_calls,
            cache_hits,
            errors: self.operations.iter().map(|op| op.errors).sum(),
            cache_efficiency: if lookups > 0 {
                cache_hits as f64 / lookups as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Log the summary at debug level
    pub fn log_summary(&self) {
        let summary = self.summary();
        if summary.total_operations == 0 {
            return;
        }
        debug!(
            operations = summary.total_operations,
            total_ms = summary.total_duration.as_millis() as u64,
            average_ms = summary.average_duration.as_millis() as u64,
            api_calls = summary.api_calls,
            cache_hits = summary.cache_hits,
            cache_efficiency = format!("{:.1}%", summary.cache_efficiency),
            errors = summary.errors,
            "Performance summary"
        );
    }

    fn current_mut(&mut self) -> Option<&mut OperationMetrics> {
        self.current.and_then(|index| self.operations.get_mut(index))
    }
}
