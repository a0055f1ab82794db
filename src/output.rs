//! Output formatting module for spendlens
//!
//! Renders reports as terminal tables or as JSON. The JSON form is the
//! serialized [`CostReport`] itself, so downstream tooling sees exactly the
//! structure the engine produced.
//!
//! # Examples
//!
//! ```no_run
//! use spendlens::output::get_formatter;
//! # fn report() -> spendlens::report_types::CostReport { unimplemented!() }
//!
//! let report = report();
//! println!("{}", get_formatter(false).format_report(&report));
//! println!("{}", get_formatter(true).format_report(&report));
//! ```

use colored::Colorize;
use prettytable::{Cell, Row, Table, format, row};
use rust_decimal::Decimal;
use serde::Serialize;
use spendlens_analysis::FocusLiteRecord;
use spendlens_analysis::signals::{Severity, Signal};
use spendlens_cache::CacheStats;
use spendlens_core::report_types::{ComparisonResult, CostReport, CostTrend, TrendDirection};

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format an overview or comparison report
    fn format_report(&self, report: &CostReport) -> String;

    /// Format FOCUS-lite rows
    fn format_focus(&self, records: &[FocusLiteRecord]) -> String;

    /// Format decision signals
    fn format_signals(&self, signals: &[Signal]) -> String;

    /// Format cache statistics
    fn format_cache_stats(&self, stats: &CacheStats) -> String;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    fn format_currency(amount: Decimal, currency: &str) -> String {
        let symbol = if currency == "USD" { "$" } else { "" };
        let rounded = amount.round_dp(2);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            format!("-{symbol}{:.2}", rounded.abs())
        } else {
            format!("{symbol}{:.2}", rounded.abs())
        }
    }

    fn format_percent(value: f64) -> String {
        format!("{value:+.1}%")
    }

    fn trend_arrow(direction: TrendDirection) -> String {
        match direction {
            TrendDirection::Up => "▲".red().to_string(),
            TrendDirection::Down => "▼".green().to_string(),
            TrendDirection::Stable => "=".dimmed().to_string(),
        }
    }

    fn format_trend(trend: &CostTrend) -> String {
        format!(
            "{} {}",
            Self::trend_arrow(trend.direction),
            Self::format_percent(trend.change_percentage)
        )
    }

    fn format_severity(severity: Severity) -> String {
        match severity {
            Severity::High => severity.to_string().red().bold().to_string(),
            Severity::Warn => severity.to_string().yellow().to_string(),
            Severity::Info => severity.to_string().dimmed().to_string(),
        }
    }

    fn format_comparison(comparison: &ComparisonResult, currency: &str) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Service",
            b -> comparison.current_window.label.clone(),
            b -> comparison.baseline_window.label.clone(),
            b -> "Delta",
            b -> "Change"
        ]);

        for delta in &comparison.service_deltas {
            table.add_row(row![
                delta.service_name,
                r -> Self::format_currency(delta.current_cost, currency),
                r -> Self::format_currency(delta.baseline_cost, currency),
                r -> Self::format_currency(delta.delta, currency),
                r -> Self::format_percent(delta.delta_percentage)
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 5]));
        table.add_row(row![
            b -> "TOTAL",
            "",
            "",
            b -> Self::format_currency(comparison.total_delta, currency),
            b -> Self::format_percent(comparison.total_delta_percentage)
        ]);

        format!(
            "\n{} vs {}\n{}",
            comparison.current_window.label.bold(),
            comparison.baseline_window.label,
            table
        )
    }
}

impl OutputFormatter for TableFormatter {
    fn format_report(&self, report: &CostReport) -> String {
        let currency = report.currency.as_str();
        let mut output = format!(
            "{} ({} to {}, {} days)\n",
            report.window.label.bold(),
            report.window_start,
            report.window_end,
            report.period_days
        );
        output.push_str(&format!(
            "Total: {}   Daily average: {}   Trend: {} ({} vs previous period)\n\n",
            Self::format_currency(report.total_cost, currency).bold(),
            Self::format_currency(report.daily_average, currency),
            Self::format_trend(&report.trend),
            Self::format_currency(report.trend.change_amount, currency)
        ));

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Service",
            b -> "Cost",
            b -> "Share",
            b -> "Daily Avg",
            b -> "Trend"
        ]);

        for service in &report.service_breakdown {
            table.add_row(row![
                service.name,
                r -> Self::format_currency(service.total_cost, currency),
                r -> format!("{:.1}%", service.percentage_of_total),
                r -> Self::format_currency(service.daily_average, currency),
                Self::format_trend(&service.trend)
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 5]));
        table.add_row(row![
            b -> "TOTAL",
            b -> Self::format_currency(report.total_cost, currency),
            "",
            b -> Self::format_currency(report.daily_average, currency),
            Self::format_trend(&report.trend)
        ]);
        output.push_str(&table.to_string());

        if let Some(comparison) = &report.comparison {
            output.push_str(&Self::format_comparison(comparison, currency));
        }
        output
    }

    fn format_focus(&self, records: &[FocusLiteRecord]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Start",
            b -> "End",
            b -> "Service",
            b -> "Cost",
            b -> "Usage"
        ]);

        for record in records {
            let usage = match (&record.usage_amount, &record.usage_unit) {
                (Some(amount), Some(unit)) => format!("{amount} {unit}"),
                (Some(amount), None) => amount.to_string(),
                _ => "-".to_string(),
            };
            table.add_row(row![
                record.time_window_start,
                record.time_window_end,
                record.service,
                r -> Self::format_currency(record.cost, &record.currency),
                r -> usage
            ]);
        }
        table.to_string()
    }

    fn format_signals(&self, signals: &[Signal]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Severity",
            b -> "Signal",
            b -> "Owner",
            b -> "Confidence",
            b -> "Evidence"
        ]);

        for signal in signals {
            table.add_row(row![
                Self::format_severity(signal.severity),
                signal.title,
                signal.owner,
                signal.confidence,
                signal.evidence
            ]);
        }
        table.to_string()
    }

    fn format_cache_stats(&self, stats: &CacheStats) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        table.add_row(row![b -> "Entries", r -> stats.entries]);
        table.add_row(row![b -> "Size", r -> format!("{:.1} KiB", stats.size_bytes as f64 / 1024.0)]);
        table.add_row(row![b -> "Hit rate", r -> format!("{:.1}%", stats.hit_rate_percent)]);
        table.add_row(row![b -> "Hits", r -> stats.hits]);
        table.add_row(row![b -> "Misses", r -> stats.misses]);
        table.add_row(row![b -> "API calls saved", r -> stats.api_calls_saved]);
        table.add_row(row![
            b -> "Estimated savings",
            r -> Self::format_currency(stats.estimated_cost_savings, "USD")
        ]);
        table.to_string()
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    fn render<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize output: {e}\"}}"))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &CostReport) -> String {
        Self::render(report)
    }

    fn format_focus(&self, records: &[FocusLiteRecord]) -> String {
        Self::render(records)
    }

    fn format_signals(&self, signals: &[Signal]) -> String {
        Self::render(signals)
    }

    fn format_cache_stats(&self, stats: &CacheStats) -> String {
        Self::render(stats)
    }
}

/// Get the appropriate formatter based on output preference
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
