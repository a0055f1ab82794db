//! spendlens - Analyze cloud billing spend
//!
//! This library provides functionality to:
//! - Resolve rolling and calendar-month reporting windows
//! - Aggregate time-bucketed billing data into totals, per-service
//!   breakdowns and period-over-period trends
//! - Compare two months service by service
//! - Cache metered API results locally with per-data-type TTLs
//! - Retry transient billing API failures and classify the rest
//! - Derive decision signals from the per-service breakdown
//!
//! # Examples
//!
//! ```no_run
//! use spendlens::{
//!     cache::MemoryCache,
//!     engine::CostAnalyzer,
//!     fetcher::JsonFileFetcher,
//!     resilience::{ResilientFetcher, RetryPolicy},
//! };
//!
//! #[tokio::main]
//! async fn main() -> spendlens::Result<()> {
//!     let fetcher = JsonFileFetcher::open("cost-and-usage.json")?;
//!     let mut analyzer = CostAnalyzer::new(
//!         ResilientFetcher::new(fetcher, RetryPolicy::default()),
//!         MemoryCache::default(),
//!     );
//!
//!     let report = analyzer.compare_months((2024, 3), (2024, 2)).await?;
//!     for delta in &report.comparison.unwrap().service_deltas {
//!         println!("{}: {}", delta.service_name, delta.delta);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod engine;
pub mod fetcher;
pub mod output;
pub mod performance;

pub use spendlens_analysis as analysis;
pub use spendlens_cache as cache;
pub use spendlens_core::{error, report_types, types, window};
pub use spendlens_resilience as resilience;

// Re-export commonly used types
pub use engine::CostAnalyzer;
pub use spendlens_core::{ErrorKind, Result, SpendlensError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
