//! Error types for spendlens
//!
//! This module defines the error types used throughout the spendlens workspace.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Failures coming back from a billing data fetcher start life as a raw
//! [`FetchError`]. The resilience layer maps those onto the fixed
//! [`ErrorKind`] taxonomy and surfaces them as [`SpendlensError::Classified`].
//!
//! # Example
//!
//! ```
//! use spendlens_core::error::{ErrorKind, Result, SpendlensError};
//!
//! fn check_month(month: u32) -> Result<u32> {
//!     if !(1..=12).contains(&month) {
//!         return Err(SpendlensError::validation("month must be 1..12"));
//!     }
//!     Ok(month)
//! }
//!
//! let err = check_month(13).unwrap_err();
//! assert_eq!(err.kind(), Some(ErrorKind::Validation));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classified failure category
///
/// This is a taxonomy, not a set of exception classes: every failure the
/// engine reports to its caller is tagged with exactly one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing, partial, invalid or expired credentials
    Credentials,
    /// Caller is authenticated but not allowed to perform the call
    Permission,
    /// API throttled the request
    RateLimit,
    /// Connection or read timeout
    NetworkTimeout,
    /// Cost data API has not been enabled on the account
    NotEnabled,
    /// Cost data API is enabled but has no data yet (takes 24-48h)
    WarmingUp,
    /// Invalid input, either local or rejected by the API
    Validation,
    /// Any other API-side failure carrying an error code
    ServiceError,
}

impl ErrorKind {
    /// Kinds that may succeed if the same call is simply repeated later
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimit | Self::NetworkTimeout | Self::ServiceError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Credentials => "credentials",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::NetworkTimeout => "network_timeout",
            Self::NotEnabled => "not_enabled",
            Self::WarmingUp => "warming_up",
            Self::Validation => "validation",
            Self::ServiceError => "service_error",
        };
        write!(f, "{name}")
    }
}

/// Raw failure reported by a billing data fetcher
///
/// Fetchers never decide retryability themselves; they describe what went
/// wrong and leave classification to the resilience layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No credentials could be located
    #[error("Unable to locate credentials")]
    MissingCredentials,

    /// Some credential fields were present but not all of them
    #[error("Partial credentials found: missing {0}")]
    PartialCredentials(String),

    /// Connect or read timeout in the transport
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Structured API error response
    #[error("API error ({code}): {message}")]
    Api {
        /// Service error code, e.g. `ThrottlingException`
        code: String,
        /// Human readable message returned by the service
        message: String,
    },

    /// Any other transport failure without a structured code
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Convenience constructor for structured API errors
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A failure that has been mapped onto the [`ErrorKind`] taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// Taxonomy bucket
    pub kind: ErrorKind,
    /// API error code when the failure carried one
    pub code: Option<String>,
    /// Detail suitable for a user-facing message
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {}

/// Main error type for spendlens operations
#[derive(Error, Debug)]
pub enum SpendlensError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure mapped onto the error taxonomy
    #[error("{0}")]
    Classified(ClassifiedError),

    /// Fetch failure that matched no classification rule, passed through as-is
    #[error(transparent)]
    Fetch(FetchError),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpendlensError {
    /// Build a classified `Validation` error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Classified(ClassifiedError::new(ErrorKind::Validation, None, message))
    }

    /// The taxonomy bucket of this error, if it has one
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified(classified) => Some(classified.kind),
            Self::InvalidArgument(_) => Some(ErrorKind::Validation),
            _ => None,
        }
    }
}

impl From<ClassifiedError> for SpendlensError {
    fn from(error: ClassifiedError) -> Self {
        Self::Classified(error)
    }
}

/// Convenience type alias for Results in spendlens
pub type Result<T> = std::result::Result<T, SpendlensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SpendlensError::Classified(ClassifiedError::new(
            ErrorKind::RateLimit,
            Some("ThrottlingException".to_string()),
            "Rate exceeded",
        ));
        assert_eq!(
            error.to_string(),
            "rate_limit (ThrottlingException): Rate exceeded"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SpendlensError = io_error.into();
        assert!(matches!(error, SpendlensError::Io(_)));
        assert_eq!(error.kind(), None);
    }

    #[test]
    fn test_fetch_error_passes_through_display() {
        let error = SpendlensError::Fetch(FetchError::Transport("socket closed".to_string()));
        assert_eq!(error.to_string(), "Transport error: socket closed");
    }

    #[test]
    fn test_transient_kinds() {
        assert!(ErrorKind::RateLimit.is_transient());
        assert!(ErrorKind::NetworkTimeout.is_transient());
        assert!(ErrorKind::ServiceError.is_transient());
        assert!(!ErrorKind::Credentials.is_transient());
        assert!(!ErrorKind::Permission.is_transient());
        assert!(!ErrorKind::Validation.is_transient());
        assert!(!ErrorKind::NotEnabled.is_transient());
        assert!(!ErrorKind::WarmingUp.is_transient());
    }
}
