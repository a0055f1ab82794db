//! Error classification
//!
//! Maps a raw [`FetchError`] onto the [`ErrorKind`] taxonomy. Checks run in a
//! fixed order:
//!
//! 1. missing or partial credentials
//! 2. transport timeouts
//! 3. structured API error codes from [`ClassificationRules::codes`]
//! 4. message phrases from [`ClassificationRules::phrases`]
//! 5. any remaining API error becomes [`ErrorKind::ServiceError`]
//!
//! Failures without a structured code are left unclassified so the caller
//! can pass them through unchanged.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use spendlens_core::error::{ClassifiedError, ErrorKind, FetchError, Result, SpendlensError};
use std::collections::BTreeMap;

/// Version of the built-in rule table
pub const RULES_VERSION: u32 = 1;

static BUILTIN_RULES: Lazy<ClassificationRules> = Lazy::new(ClassificationRules::builtin);

/// Message fragment that identifies a failure kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    /// Matched case-insensitively against the error message
    pub phrase: String,
    pub kind: ErrorKind,
}

impl PhraseRule {
    pub fn new(phrase: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            phrase: phrase.into().to_lowercase(),
            kind,
        }
    }
}

/// Versioned rule table used by [`classify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRules {
    pub version: u32,
    /// API error code to kind
    pub codes: BTreeMap<String, ErrorKind>,
    /// Fallback phrases, checked in order when the code is not listed
    pub phrases: Vec<PhraseRule>,
}

impl ClassificationRules {
    /// Shared instance of the built-in table
    pub fn standard() -> &'static ClassificationRules {
        &BUILTIN_RULES
    }

    /// Load a rule table from JSON, e.g. an operator-maintained override file
    pub fn from_json(content: &str) -> Result<Self> {
        let mut rules: Self = serde_json::from_str(content)?;
        if rules.version == 0 {
            return Err(SpendlensError::Config(
                "classification rules must declare a version".to_string(),
            ));
        }
        for rule in &mut rules.phrases {
            rule.phrase = rule.phrase.to_lowercase();
        }
        Ok(rules)
    }

    fn builtin() -> Self {
        let groups: [(ErrorKind, &[&str]); 6] = [
            (
                ErrorKind::Credentials,
                &[
                    "InvalidClientTokenId",
                    "ExpiredToken",
                    "ExpiredTokenException",
                    "SignatureDoesNotMatch",
                    "UnrecognizedClientException",
                    "InvalidAccessKeyId",
                    "AuthFailure",
                ],
            ),
            (
                ErrorKind::Permission,
                &[
                    "AccessDenied",
                    "AccessDeniedException",
                    "UnauthorizedOperation",
                    "UnauthorizedException",
                ],
            ),
            (
                ErrorKind::RateLimit,
                &[
                    "Throttling",
                    "ThrottlingException",
                    "RequestLimitExceeded",
                    "TooManyRequestsException",
                    "LimitExceededException",
                ],
            ),
            (
                ErrorKind::NetworkTimeout,
                &["RequestTimeout", "RequestTimeoutException"],
            ),
            (
                ErrorKind::Validation,
                &[
                    "ValidationException",
                    "InvalidParameterValue",
                    "InvalidParameterException",
                    "InvalidParameterCombination",
                ],
            ),
            (ErrorKind::WarmingUp, &["DataUnavailableException"]),
        ];

        let codes = groups
            .iter()
            .flat_map(|(kind, codes)| codes.iter().map(move |code| (code.to_string(), *kind)))
            .collect();

        Self {
            version: RULES_VERSION,
            codes,
            phrases: vec![
                PhraseRule::new("not enabled", ErrorKind::NotEnabled),
                PhraseRule::new("warming up", ErrorKind::WarmingUp),
                PhraseRule::new("data is not available", ErrorKind::WarmingUp),
            ],
        }
    }

    /// Classify `error`, falling back to the raw error when no rule applies
    pub fn to_error(&self, error: FetchError) -> SpendlensError {
        match classify(&error, self) {
            Some(classified) => SpendlensError::Classified(classified),
            None => SpendlensError::Fetch(error),
        }
    }

    fn kind_for_code(&self, code: &str) -> Option<ErrorKind> {
        self.codes.get(code).copied().or_else(|| {
            self.codes
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(code))
                .map(|(_, kind)| *kind)
        })
    }

    fn kind_for_message(&self, message: &str) -> Option<ErrorKind> {
        let message = message.to_lowercase();
        self.phrases
            .iter()
            .find(|rule| message.contains(&rule.phrase))
            .map(|rule| rule.kind)
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::standard().clone()
    }
}

/// Map `error` onto the taxonomy, or `None` when it carries nothing to go on
pub fn classify(error: &FetchError, rules: &ClassificationRules) -> Option<ClassifiedError> {
    match error {
        FetchError::MissingCredentials | FetchError::PartialCredentials(_) => Some(
            ClassifiedError::new(ErrorKind::Credentials, None, error.to_string()),
        ),
        FetchError::Timeout(detail) => Some(ClassifiedError::new(
            ErrorKind::NetworkTimeout,
            None,
            detail.clone(),
        )),
        FetchError::Api { code, message } => {
            let kind = rules
                .kind_for_code(code)
                .or_else(|| rules.kind_for_message(message))
                .unwrap_or(ErrorKind::ServiceError);
            Some(ClassifiedError::new(kind, Some(code.clone()), message.clone()))
        }
        FetchError::Transport(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(error: FetchError) -> Option<ErrorKind> {
        classify(&error, ClassificationRules::standard()).map(|c| c.kind)
    }

    #[test]
    fn test_credentials_and_timeouts() {
        assert_eq!(kind_of(FetchError::MissingCredentials), Some(ErrorKind::Credentials));
        assert_eq!(
            kind_of(FetchError::PartialCredentials("aws_secret_access_key".into())),
            Some(ErrorKind::Credentials)
        );
        assert_eq!(
            kind_of(FetchError::Timeout("read timeout on endpoint".into())),
            Some(ErrorKind::NetworkTimeout)
        );
    }

    #[test]
    fn test_structured_codes() {
        let cases = [
            ("ExpiredToken", ErrorKind::Credentials),
            ("SignatureDoesNotMatch", ErrorKind::Credentials),
            ("AccessDeniedException", ErrorKind::Permission),
            ("UnauthorizedOperation", ErrorKind::Permission),
            ("ThrottlingException", ErrorKind::RateLimit),
            ("RequestLimitExceeded", ErrorKind::RateLimit),
            ("ValidationException", ErrorKind::Validation),
            ("DataUnavailableException", ErrorKind::WarmingUp),
            ("throttling", ErrorKind::RateLimit),
        ];
        for (code, expected) in cases {
            assert_eq!(kind_of(FetchError::api(code, "boom")), Some(expected), "{code}");
        }
    }

    #[test]
    fn test_phrase_fallback() {
        assert_eq!(
            kind_of(FetchError::api("BillingError", "Cost Explorer is NOT ENABLED for this account")),
            Some(ErrorKind::NotEnabled)
        );
        assert_eq!(
            kind_of(FetchError::api("BillingError", "Cost Explorer is warming up")),
            Some(ErrorKind::WarmingUp)
        );
        assert_eq!(
            kind_of(FetchError::api("BillingError", "Data is not available yet")),
            Some(ErrorKind::WarmingUp)
        );
    }

    #[test]
    fn test_unknown_code_is_service_error() {
        let classified = classify(
            &FetchError::api("InternalFailure", "try later"),
            ClassificationRules::standard(),
        )
        .unwrap();
        assert_eq!(classified.kind, ErrorKind::ServiceError);
        assert_eq!(classified.code.as_deref(), Some("InternalFailure"));
        assert_eq!(classified.message, "try later");
    }

    #[test]
    fn test_transport_failures_pass_through() {
        let raw = FetchError::Transport("connection reset".into());
        assert_eq!(kind_of(raw.clone()), None);

        let error = ClassificationRules::default().to_error(raw.clone());
        assert!(matches!(error, SpendlensError::Fetch(ref inner) if *inner == raw));
        assert_eq!(error.kind(), None);
    }

    #[test]
    fn test_rules_load_from_json() {
        let rules = ClassificationRules::from_json(
            r#"{
                "version": 2,
                "codes": {"BillingPaused": "not_enabled"},
                "phrases": [{"phrase": "Quota Hit", "kind": "rate_limit"}]
            }"#,
        )
        .unwrap();
        assert_eq!(rules.version, 2);

        let paused = classify(&FetchError::api("BillingPaused", ""), &rules).unwrap();
        assert_eq!(paused.kind, ErrorKind::NotEnabled);
        let quota = classify(&FetchError::api("Other", "quota hit today"), &rules).unwrap();
        assert_eq!(quota.kind, ErrorKind::RateLimit);

        let missing_version = ClassificationRules::from_json(r#"{"version": 0, "codes": {}, "phrases": []}"#);
        assert!(matches!(missing_version, Err(SpendlensError::Config(_))));
    }
}
