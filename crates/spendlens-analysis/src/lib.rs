//! Aggregation, trend, and comparison engine for spendlens
//!
//! Everything in this crate is a pure function over immutable fetch results:
//! no I/O, no shared state.

pub mod aggregation;
pub mod comparison;
pub mod focus;
pub mod signals;

pub use aggregation::{
    aggregate_by_service, aggregate_total, analyze, breakdown, cost_records, cost_records_with,
    group_cost, preferred_metric, shared_metric, trend,
};
pub use comparison::compare_months;
pub use focus::{FocusLiteRecord, focus_lite_records};
pub use signals::{Signal, SignalThresholds, from_services};
