//! Resilience layer for spendlens
//!
//! Wraps a [`BillingFetcher`](spendlens_core::BillingFetcher) with an explicit
//! [`RetryPolicy`] and maps raw fetch failures onto the
//! [`ErrorKind`](spendlens_core::ErrorKind) taxonomy using versioned
//! [`ClassificationRules`].

pub mod classify;
pub mod fetcher;
pub mod retry;

pub use classify::{ClassificationRules, PhraseRule, RULES_VERSION, classify};
pub use fetcher::ResilientFetcher;
pub use retry::{RetryPolicy, RetryPredicate};
