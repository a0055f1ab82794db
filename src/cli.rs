//! CLI interface for spendlens
//!
//! # Example
//!
//! ```bash
//! # Spend over the last 30 days with trend against the 30 days before
//! spendlens overview --days 30
//!
//! # One calendar month, as JSON
//! spendlens month --month 2024-03 --json
//!
//! # Per-service deltas between two months
//! spendlens compare --current 2024-03 --baseline 2024-02
//!
//! # Concentration, spike and rising-service signals for a month
//! spendlens signals --month 2024-03
//!
//! # Cache housekeeping
//! spendlens cache stats
//! ```

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use spendlens_analysis::SignalThresholds;
use spendlens_cache::CacheConfig;
use spendlens_core::error::{ErrorKind, Result, SpendlensError};
use spendlens_core::window::{MAX_ROLLING_DAYS, parse_month};
use spendlens_resilience::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Analyze cloud billing spend
#[derive(Parser, Debug, Clone)]
#[command(name = "spendlens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Only show warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Show debug output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Recorded Cost Explorer response to read billing data from
    #[arg(long, env = "SPENDLENS_DATA_FILE", global = true)]
    pub data_file: Option<PathBuf>,

    #[command(flatten)]
    pub cache: CacheArgs,

    #[command(flatten)]
    pub retry: RetryArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Local result cache options
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Directory holding the result cache
    #[arg(long, env = "SPENDLENS_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Neither read nor write the result cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Cache size budget in MiB
    #[arg(long, default_value_t = 50, global = true)]
    pub max_cache_mb: u64,
}

/// Retry options for billing API calls
#[derive(Args, Debug, Clone)]
pub struct RetryArgs {
    /// Retries after the first attempt for transient failures
    #[arg(long, default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value_t = 1000, global = true)]
    pub base_delay_ms: u64,

    /// Upper bound for any retry delay, in milliseconds
    #[arg(long, default_value_t = 30_000, global = true)]
    pub max_delay_ms: u64,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Spend over the last N days compared with the N days before
    Overview {
        /// Number of days to analyze (1-365)
        #[arg(long, short = 'd', default_value_t = 30, value_parser = parse_days)]
        days: i64,
    },

    /// Spend for one calendar month compared with the month before
    Month {
        /// Month to analyze (YYYY-MM)
        #[arg(long, short = 'm', value_parser = parse_month_arg)]
        month: (i32, u32),
    },

    /// Per-service deltas between two calendar months
    Compare {
        /// Month under review (YYYY-MM)
        #[arg(long, value_parser = parse_month_arg)]
        current: (i32, u32),

        /// Month to compare against (YYYY-MM)
        #[arg(long, value_parser = parse_month_arg)]
        baseline: (i32, u32),
    },

    /// Export FOCUS-lite cost rows as JSON
    Export {
        /// Number of days to export (1-365)
        #[arg(long, short = 'd', default_value_t = 30, value_parser = parse_days)]
        days: i64,
    },

    /// Decision signals derived from the per-service breakdown
    Signals {
        /// Number of days to analyze (1-365)
        #[arg(long, short = 'd', default_value_t = 30, value_parser = parse_days, conflicts_with = "month")]
        days: i64,

        /// Analyze a calendar month instead of a rolling window (YYYY-MM)
        #[arg(long, short = 'm', value_parser = parse_month_arg)]
        month: Option<(i32, u32)>,

        /// Share of spend (percent) at which the top service is flagged
        #[arg(long, default_value_t = 35.0)]
        concentration_pct: f64,

        /// Minimum cost increase for a spike driver
        #[arg(long, default_value = "100")]
        spike_amount: Decimal,

        /// Minimum percentage increase for a spike driver
        #[arg(long, default_value_t = 10.0)]
        spike_pct: f64,
    },

    /// Inspect or clear the local result cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show entry count, size and hit statistics
    Stats,
    /// Remove every cached entry
    Clear,
}

impl Cli {
    /// Cache directory from the flag, the environment, or the platform default
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("spendlens"))
            .ok_or_else(|| {
                SpendlensError::Config(
                    "no platform cache directory; pass --cache-dir".to_string(),
                )
            })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_size_bytes: self.cache.max_cache_mb.saturating_mul(1024 * 1024),
            ..CacheConfig::default()
        }
    }

    /// Signal thresholds from the `signals` flags, defaults otherwise
    pub fn signal_thresholds(&self) -> SignalThresholds {
        match self.command {
            Command::Signals {
                concentration_pct,
                spike_amount,
                spike_pct,
                ..
            } => SignalThresholds {
                concentration_pct,
                spike_amount,
                spike_pct,
                ..SignalThresholds::default()
            },
            _ => SignalThresholds::default(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }
}

/// Parse a day count, accepting 1 through 365
pub fn parse_days(value: &str) -> std::result::Result<i64, String> {
    let days: i64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a whole number of days"))?;
    if !(1..=MAX_ROLLING_DAYS).contains(&days) {
        return Err(format!("days must be between 1 and {MAX_ROLLING_DAYS}"));
    }
    Ok(days)
}

/// Parse a `YYYY-MM` month argument
pub fn parse_month_arg(value: &str) -> std::result::Result<(i32, u32), String> {
    parse_month(value).map_err(|e| e.to_string())
}

/// Suggested next step for a classified failure
pub fn error_hint(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Credentials => {
            "AWS credentials are missing or invalid. Run `aws configure` or set AWS_PROFILE."
        }
        ErrorKind::Permission => {
            "Access denied calling AWS APIs. Grant ce:GetCostAndUsage to this identity."
        }
        ErrorKind::RateLimit => "AWS API rate limit exceeded. Wait a moment and try again.",
        ErrorKind::NetworkTimeout => "The request timed out. Check your network connection.",
        ErrorKind::NotEnabled => {
            "Cost Explorer is not enabled. Enable it in the AWS Billing console."
        }
        ErrorKind::WarmingUp => {
            "Cost Explorer was enabled recently; data becomes available within 24-48 hours."
        }
        ErrorKind::Validation => "Check your input parameters and try again.",
        ErrorKind::ServiceError => "AWS returned an error. Try again later.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_overview_defaults() {
        let cli = Cli::try_parse_from(["spendlens", "overview"]).unwrap();
        assert!(matches!(cli.command, Command::Overview { days: 30 }));
        assert!(!cli.json);
        assert_eq!(cli.retry.max_retries, 3);
        assert_eq!(cli.cache_config().max_size_bytes, 50 * 1024 * 1024);
        assert_eq!(cli.retry_policy().max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_days_bounds() {
        assert!(Cli::try_parse_from(["spendlens", "overview", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["spendlens", "overview", "--days", "366"]).is_err());
        assert!(Cli::try_parse_from(["spendlens", "export", "--days", "365"]).is_ok());
        assert_eq!(parse_days("abc").unwrap_err(), "'abc' is not a whole number of days");
    }

    #[test]
    fn test_parse_compare_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "spendlens",
            "compare",
            "--current",
            "2024-03",
            "--baseline",
            "2023-12",
            "--json",
            "--no-cache",
            "--max-retries",
            "1",
        ])
        .unwrap();
        match cli.command {
            Command::Compare { current, baseline } => {
                assert_eq!(current, (2024, 3));
                assert_eq!(baseline, (2023, 12));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(cli.json);
        assert!(cli.cache.no_cache);
        assert_eq!(cli.retry_policy().max_retries, 1);
    }

    #[test]
    fn test_bad_month_rejected() {
        assert!(Cli::try_parse_from(["spendlens", "month", "--month", "2024-13"]).is_err());
        assert!(Cli::try_parse_from(["spendlens", "month", "--month", "March"]).is_err());
    }

    #[test]
    fn test_cache_subcommands_and_dir_override() {
        let cli =
            Cli::try_parse_from(["spendlens", "cache", "clear", "--cache-dir", "/tmp/sl"]).unwrap();
        assert!(matches!(cli.command, Command::Cache { action: CacheCommand::Clear }));
        assert_eq!(cli.cache_dir().unwrap(), PathBuf::from("/tmp/sl"));
    }

    #[test]
    fn test_parse_signals() {
        let cli = Cli::try_parse_from(["spendlens", "signals"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Signals {
                days: 30,
                month: None,
                ..
            }
        ));
        assert_eq!(cli.signal_thresholds(), SignalThresholds::default());

        let cli = Cli::try_parse_from([
            "spendlens",
            "signals",
            "--month",
            "2024-03",
            "--concentration-pct",
            "50",
            "--spike-amount",
            "250.5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Signals {
                month: Some((2024, 3)),
                ..
            }
        ));
        let thresholds = cli.signal_thresholds();
        assert_eq!(thresholds.concentration_pct, 50.0);
        assert_eq!(thresholds.spike_amount, Decimal::new(2505, 1));
        assert_eq!(thresholds.spike_pct, 10.0);

        assert!(
            Cli::try_parse_from(["spendlens", "signals", "--days", "7", "--month", "2024-03"])
                .is_err()
        );
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["spendlens", "-q", "-v", "overview"]).is_err());
    }

    #[test]
    fn test_every_kind_has_a_hint() {
        assert!(error_hint(ErrorKind::Permission).contains("Access denied"));
        assert!(error_hint(ErrorKind::WarmingUp).contains("24-48"));
    }
}
