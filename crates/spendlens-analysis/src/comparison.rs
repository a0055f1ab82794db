//! Month-over-month comparison
//!
//! Compares two already-analyzed periods: `current` against `baseline`.

use crate::aggregation::percent_change;
use rust_decimal::Decimal;
use spendlens_core::report_types::{AnalysisResult, ComparisonResult, ServiceDelta};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of service rows kept in a comparison
pub const MAX_SERVICE_DELTAS: usize = 50;

/// Compare `current` against `baseline`
///
/// Rows cover the union of services seen in either period, ordered by
/// absolute delta (largest first) with ties broken by service name.
pub fn compare_months(current: &AnalysisResult, baseline: &AnalysisResult) -> ComparisonResult {
    let current_services = service_costs(current);
    let baseline_services = service_costs(baseline);

    let names: BTreeSet<&String> = current_services
        .keys()
        .chain(baseline_services.keys())
        .collect();

    let mut service_deltas: Vec<ServiceDelta> = names
        .into_iter()
        .map(|name| {
            let current_cost = current_services.get(name).copied().unwrap_or(Decimal::ZERO);
            let baseline_cost = baseline_services.get(name).copied().unwrap_or(Decimal::ZERO);
            ServiceDelta {
                service_name: name.clone(),
                current_cost,
                baseline_cost,
                delta: current_cost - baseline_cost,
                delta_percentage: percent_change(current_cost, baseline_cost),
            }
        })
        .collect();

    service_deltas.sort_by(|a, b| {
        b.delta
            .abs()
            .cmp(&a.delta.abs())
            .then_with(|| a.service_name.cmp(&b.service_name))
    });
    service_deltas.truncate(MAX_SERVICE_DELTAS);

    ComparisonResult {
        current_window: current.window.clone(),
        baseline_window: baseline.window.clone(),
        service_deltas,
        total_delta: current.total_cost - baseline.total_cost,
        total_delta_percentage: percent_change(current.total_cost, baseline.total_cost),
    }
}

/// Full per-service totals, falling back to the breakdown rows when the
/// analysis was deserialized without them
fn service_costs(analysis: &AnalysisResult) -> BTreeMap<String, Decimal> {
    if !analysis.service_totals.is_empty() {
        return analysis.service_totals.clone();
    }
    analysis
        .service_breakdown
        .iter()
        .map(|row| (row.name.clone(), row.total_cost))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{analyze, cost_records};
    use spendlens_core::test_utils::{daily_bucket, dec};
    use spendlens_core::window::calendar_month_window;

    fn month(year: i32, month: u32, services: &[(&str, &str)]) -> AnalysisResult {
        let window = calendar_month_window(year, month).unwrap();
        let records = cost_records(&[daily_bucket(window.start, services)]);
        analyze(&records, &[], &window)
    }

    #[test]
    fn test_compare_months_scenario() {
        let current = month(2024, 2, &[("EC2", "700")]);
        let baseline = month(2024, 1, &[("EC2", "600"), ("S3", "100")]);

        let result = compare_months(&current, &baseline);
        assert_eq!(result.current_window.label, "2024-02");
        assert_eq!(result.baseline_window.label, "2024-01");
        assert_eq!(result.service_deltas.len(), 2);

        // equal |delta|, so name order decides
        let ec2 = &result.service_deltas[0];
        assert_eq!(ec2.service_name, "EC2");
        assert_eq!(ec2.delta, dec("100"));
        assert!((ec2.delta_percentage - 16.666_666).abs() < 1e-3);

        let s3 = &result.service_deltas[1];
        assert_eq!(s3.service_name, "S3");
        assert_eq!(s3.current_cost, Decimal::ZERO);
        assert_eq!(s3.delta, dec("-100"));
        assert_eq!(s3.delta_percentage, -100.0);

        assert_eq!(result.total_delta, Decimal::ZERO);
        assert_eq!(result.total_delta_percentage, 0.0);
    }

    #[test]
    fn test_compare_orders_by_absolute_delta() {
        let current = month(2024, 3, &[("A", "10"), ("B", "500"), ("C", "0")]);
        let baseline = month(2024, 2, &[("A", "15"), ("B", "490"), ("C", "80")]);

        let result = compare_months(&current, &baseline);
        let names: Vec<&str> = result
            .service_deltas
            .iter()
            .map(|row| row.service_name.as_str())
            .collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_compare_zero_baseline() {
        let current = month(2024, 3, &[("Lambda", "12.5")]);
        let baseline = month(2024, 2, &[]);

        let result = compare_months(&current, &baseline);
        assert_eq!(result.service_deltas[0].delta_percentage, 100.0);
        assert_eq!(result.total_delta, dec("12.5"));
        assert_eq!(result.total_delta_percentage, 100.0);
    }

    #[test]
    fn test_compare_truncates_to_fifty_rows() {
        let pairs: Vec<(String, String)> = (0..60)
            .map(|i| (format!("svc-{i:02}"), format!("{}", i + 1)))
            .collect();
        let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let current = month(2024, 5, &borrowed);
        let baseline = month(2024, 4, &[]);

        let result = compare_months(&current, &baseline);
        assert_eq!(result.service_deltas.len(), MAX_SERVICE_DELTAS);
        assert_eq!(result.service_deltas[0].service_name, "svc-59");
    }

    #[test]
    fn test_compare_uses_services_beyond_top_ten() {
        let pairs: Vec<(String, String)> = (0..12)
            .map(|i| (format!("svc-{i:02}"), "5".to_string()))
            .collect();
        let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let current = month(2024, 5, &borrowed);
        let baseline = month(2024, 4, &borrowed);

        let result = compare_months(&current, &baseline);
        assert_eq!(result.service_deltas.len(), 12);
        assert!(result.service_deltas.iter().all(|row| row.delta == Decimal::ZERO));
    }
}
