//! Decision signals derived from a service breakdown
//!
//! Turns the per-service rows of an analysis into a short list of findings
//! that are easy to share: spend concentrated in one service, services
//! driving a spike, and services on a steady rise. Signals only read
//! [`ServiceBreakdown`] fields, so the same rows always give the same signals.
//!
//! # Examples
//!
//! ```
//! use spendlens_analysis::signals::{SignalId, SignalThresholds, from_services};
//!
//! let signals = from_services(&[], "2024-03", &SignalThresholds::default());
//! assert_eq!(signals[0].id, SignalId::NoData);
//! ```

use rust_decimal::Decimal;
use serde::Serialize;
use spendlens_core::report_types::{ServiceBreakdown, TrendDirection};
use std::fmt;

/// Most spike drivers listed in one signal
pub const MAX_SPIKE_DRIVERS: usize = 3;

/// Most services listed on the rising watchlist
pub const MAX_RISING_SERVICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalId {
    ConcentrationRisk,
    SpikeDrivers,
    RisingWatchlist,
    NoSignals,
    NoData,
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConcentrationRisk => write!(f, "concentration_risk"),
            Self::SpikeDrivers => write!(f, "spike_drivers"),
            Self::RisingWatchlist => write!(f, "rising_watchlist"),
            Self::NoSignals => write!(f, "no_signals"),
            Self::NoData => write!(f, "no_data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Team expected to act on a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Owner {
    Shared,
    FinOps,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "Shared"),
            Self::FinOps => write!(f, "FinOps"),
        }
    }
}

/// A service whose cost moved between periods
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mover {
    pub service_name: String,
    pub trend_amount: Decimal,
    pub trend_percentage: f64,
}

/// Facts backing a signal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Evidence {
    Concentration {
        period: String,
        service_name: String,
        percentage_of_total: f64,
        total_cost: Decimal,
    },
    Drivers {
        period: String,
        drivers: Vec<Mover>,
    },
    Watchlist {
        period: String,
        services: Vec<Mover>,
    },
    Period {
        period: String,
    },
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concentration {
                period,
                service_name,
                percentage_of_total,
                total_cost,
            } => write!(
                f,
                "period={period}, service_name={service_name}, \
                 percentage_of_total={percentage_of_total}, total_cost={total_cost}"
            ),
            Self::Drivers { period, drivers: movers } | Self::Watchlist { period, services: movers } => {
                write!(f, "period={period}")?;
                for mover in movers {
                    let sign = if mover.trend_amount.is_sign_negative() { "" } else { "+" };
                    write!(
                        f,
                        ", {} {sign}{} ({:+.1}%)",
                        mover.service_name, mover.trend_amount, mover.trend_percentage
                    )?;
                }
                Ok(())
            }
            Self::Period { period } => write!(f, "period={period}"),
        }
    }
}

/// One decision signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: SignalId,
    pub title: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub owner: Owner,
    pub evidence: Evidence,
}

/// Limits that turn breakdown rows into signals
#[derive(Debug, Clone, PartialEq)]
pub struct SignalThresholds {
    /// Share of spend (percent) at which the top service is a concentration risk
    pub concentration_pct: f64,
    /// Extra share above `concentration_pct` that raises the severity to high
    pub high_concentration_margin: f64,
    /// Minimum period-over-period increase for a spike driver
    pub spike_amount: Decimal,
    /// Minimum percentage increase for a spike driver
    pub spike_pct: f64,
    /// Minimum increase for the rising watchlist
    pub rising_amount: Decimal,
    /// Minimum percentage increase for the rising watchlist
    pub rising_pct: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            concentration_pct: 35.0,
            high_concentration_margin: 10.0,
            spike_amount: Decimal::ONE_HUNDRED,
            spike_pct: 10.0,
            rising_amount: Decimal::new(25, 0),
            rising_pct: 7.5,
        }
    }
}

/// Derive decision signals from `services` for the period labelled `period`
///
/// Always returns at least one signal: `no_data` for an empty breakdown and
/// `no_signals` when no threshold is crossed.
pub fn from_services(
    services: &[ServiceBreakdown],
    period: &str,
    thresholds: &SignalThresholds,
) -> Vec<Signal> {
    if services.is_empty() {
        return vec![Signal {
            id: SignalId::NoData,
            title: "No service rows to derive signals from".to_string(),
            severity: Severity::Info,
            confidence: Confidence::High,
            owner: Owner::Shared,
            evidence: Evidence::Period {
                period: period.to_string(),
            },
        }];
    }

    let mut signals = Vec::new();
    signals.extend(concentration_risk(services, period, thresholds));

    // stable sort: equal amounts keep breakdown order
    let mut by_increase: Vec<&ServiceBreakdown> = services.iter().collect();
    by_increase.sort_by(|a, b| b.trend.change_amount.cmp(&a.trend.change_amount));

    let drivers: Vec<Mover> = by_increase
        .iter()
        .filter(|row| {
            row.trend.change_amount >= thresholds.spike_amount
                && row.trend.change_percentage >= thresholds.spike_pct
        })
        .take(MAX_SPIKE_DRIVERS)
        .map(|row| mover(row))
        .collect();
    if !drivers.is_empty() {
        signals.push(Signal {
            id: SignalId::SpikeDrivers,
            title: "Spike drivers detected (top movers)".to_string(),
            severity: Severity::Warn,
            confidence: Confidence::Medium,
            owner: Owner::FinOps,
            evidence: Evidence::Drivers {
                period: period.to_string(),
                drivers,
            },
        });
    }

    let rising: Vec<Mover> = by_increase
        .iter()
        .filter(|row| {
            row.trend.direction == TrendDirection::Up
                && row.trend.change_percentage >= thresholds.rising_pct
                && row.trend.change_amount >= thresholds.rising_amount
        })
        .take(MAX_RISING_SERVICES)
        .map(|row| mover(row))
        .collect();
    if !rising.is_empty() {
        signals.push(Signal {
            id: SignalId::RisingWatchlist,
            title: "Rising services watchlist".to_string(),
            severity: Severity::Info,
            confidence: Confidence::Medium,
            owner: Owner::FinOps,
            evidence: Evidence::Watchlist {
                period: period.to_string(),
                services: rising,
            },
        });
    }

    if signals.is_empty() {
        signals.push(Signal {
            id: SignalId::NoSignals,
            title: "No notable signals detected from service breakdown".to_string(),
            severity: Severity::Info,
            confidence: Confidence::High,
            owner: Owner::Shared,
            evidence: Evidence::Period {
                period: period.to_string(),
            },
        });
    }
    signals
}

fn concentration_risk(
    services: &[ServiceBreakdown],
    period: &str,
    thresholds: &SignalThresholds,
) -> Option<Signal> {
    // first row wins ties
    let top = services.iter().reduce(|best, row| {
        if row.percentage_of_total > best.percentage_of_total {
            row
        } else {
            best
        }
    })?;
    if top.percentage_of_total < thresholds.concentration_pct {
        return None;
    }

    let severity =
        if top.percentage_of_total >= thresholds.concentration_pct + thresholds.high_concentration_margin {
            Severity::High
        } else {
            Severity::Warn
        };

    Some(Signal {
        id: SignalId::ConcentrationRisk,
        title: format!(
            "Concentration risk: {} is {:.1}% of spend",
            top.name, top.percentage_of_total
        ),
        severity,
        confidence: Confidence::High,
        owner: Owner::Shared,
        evidence: Evidence::Concentration {
            period: period.to_string(),
            service_name: top.name.clone(),
            percentage_of_total: round2(top.percentage_of_total),
            total_cost: top.total_cost.round_dp(2),
        },
    })
}

fn mover(row: &ServiceBreakdown) -> Mover {
    Mover {
        service_name: row.name.clone(),
        trend_amount: row.trend.change_amount.round_dp(2),
        trend_percentage: round2(row.trend.change_percentage),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
