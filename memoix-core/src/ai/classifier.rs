//! Maps raw provider outcomes into the closed [`AiErrorType`] taxonomy.
//!
//! Checks run in a fixed priority order and the first match wins:
//!
//! 1. provider disabled → `disabled`
//! 2. provider has no API key → `noToken`
//! 3. HTTP 401/403 → `invalidToken`
//! 4. HTTP 429 → `rateLimited`
//! 5. DNS failure or connect timeout → `noInternet`
//! 6. read timeout → `timeout`
//! 7. body over the size ceiling → `responseTooLarge`
//! 8. body not parseable, missing required keys, or rejected by the payload
//!    check → `malformedResponse`
//! 9. parsed body → success
//! 10. anything else → `unknown`
//!
//! Steps 1-2 are also exposed as [`ResponseClassifier::precheck`] so a provider
//! can be skipped before any request is made.

use std::fmt;

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::config::{ImportConfig, DEFAULT_MAX_RESPONSE_BYTES};
use super::provider::{RawOutcome, TransportErrorKind};
use super::types::{AiErrorType, AiResponse};
use crate::settings::{ProviderConfig, ProviderId};

/// Why a 2xx body was rejected.
#[derive(Error, Debug)]
enum MalformedReason {
    #[error("body is not JSON: {0}")]
    NotJson(serde_json::Error),

    #[error("no model text in {0} response")]
    NoModelText(ProviderId),

    #[error("model output is not JSON: {0}")]
    PayloadNotJson(serde_json::Error),

    #[error("model output is not a JSON object")]
    PayloadNotObject,

    #[error("model output is missing required key `{0}`")]
    MissingKey(String),

    #[error("model output has the wrong shape: {0}")]
    Rejected(String),
}

/// Shape check run on the model's JSON object after the required keys.
///
/// An `Err` makes the response `malformedResponse`, so the orchestrator can
/// fall through to the next provider.
pub type PayloadCheck = fn(&Map<String, JsonValue>) -> Result<(), String>;

#[derive(Clone)]
pub struct ClassifierConfig {
    /// Bodies longer than this are `responseTooLarge`.
    pub max_body_bytes: usize,
    /// Keys the model's JSON object must contain.
    pub required_keys: Vec<String>,
    pub payload_check: Option<PayloadCheck>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            required_keys: vec!["name".to_string()],
            payload_check: None,
        }
    }
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("max_body_bytes", &self.max_body_bytes)
            .field("required_keys", &self.required_keys)
            .field("payload_check", &self.payload_check.is_some())
            .finish()
    }
}

/// Turns a [`RawOutcome`] into an [`AiResponse`].
///
/// Classification is a pure function of the outcome and the provider config.
#[derive(Debug, Clone, Default)]
pub struct ResponseClassifier {
    config: ClassifierConfig,
}

impl ResponseClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn from_import_config(config: &ImportConfig) -> Self {
        Self::new(ClassifierConfig {
            max_body_bytes: config.max_response_bytes,
            ..Default::default()
        })
    }

    pub fn with_payload_check(mut self, check: PayloadCheck) -> Self {
        self.config.payload_check = Some(check);
        self
    }

    /// Eligibility check that needs no network outcome.
    ///
    /// Returns the error a call to this provider would be classified as
    /// regardless of its outcome, or `None` if the provider may be called.
    pub fn precheck(&self, config: &ProviderConfig) -> Option<AiResponse> {
        if !config.enabled {
            return Some(AiResponse::error(AiErrorType::Disabled));
        }
        if !config.is_configured() {
            return Some(AiResponse::error(AiErrorType::NoToken));
        }
        None
    }

    pub fn classify(&self, outcome: &RawOutcome, config: &ProviderConfig) -> AiResponse {
        if let Some(response) = self.precheck(config) {
            return response;
        }

        match outcome {
            RawOutcome::HttpFailure {
                status: 401 | 403,
                body,
            } => AiResponse::error_with_raw(AiErrorType::InvalidToken, lossy(body)),
            RawOutcome::HttpFailure { status: 429, body } => {
                AiResponse::error_with_raw(AiErrorType::RateLimited, lossy(body))
            }
            RawOutcome::TransportError(
                TransportErrorKind::Dns | TransportErrorKind::ConnectTimeout,
            ) => AiResponse::error(AiErrorType::NoInternet),
            RawOutcome::TransportError(TransportErrorKind::ReadTimeout) => {
                AiResponse::error(AiErrorType::Timeout)
            }
            RawOutcome::HttpSuccess { body, .. } if body.len() > self.config.max_body_bytes => {
                AiResponse::error_with_raw(
                    AiErrorType::ResponseTooLarge,
                    format!(
                        "Response of at least {} bytes exceeds the {} byte limit",
                        body.len(),
                        self.config.max_body_bytes
                    ),
                )
            }
            RawOutcome::HttpSuccess { body, .. } => {
                match self.parse_success(config.provider, body) {
                    Ok(data) => AiResponse::success(data),
                    Err(reason) => {
                        tracing::debug!(
                            provider = %config.provider,
                            reason = %reason,
                            "Malformed provider response"
                        );
                        AiResponse::error_with_raw(AiErrorType::MalformedResponse, lossy(body))
                    }
                }
            }
            RawOutcome::HttpFailure { status, body } => {
                let raw = if *status == 0 {
                    lossy(body)
                } else {
                    format!("HTTP {}: {}", status, lossy(body))
                };
                AiResponse::error_with_raw(AiErrorType::Unknown, raw)
            }
            RawOutcome::TransportError(TransportErrorKind::Cancelled) => {
                AiResponse::error_with_raw(AiErrorType::Unknown, "Request cancelled")
            }
        }
    }

    fn parse_success(
        &self,
        provider: ProviderId,
        body: &[u8],
    ) -> Result<Map<String, JsonValue>, MalformedReason> {
        let envelope: JsonValue = serde_json::from_slice(body).map_err(MalformedReason::NotJson)?;
        let text = model_text(provider, &envelope).ok_or(MalformedReason::NoModelText(provider))?;

        let payload: JsonValue = serde_json::from_str(strip_code_fence(text))
            .map_err(MalformedReason::PayloadNotJson)?;
        let JsonValue::Object(data) = payload else {
            return Err(MalformedReason::PayloadNotObject);
        };

        if let Some(missing) = self
            .config
            .required_keys
            .iter()
            .find(|key| !data.contains_key(key.as_str()))
        {
            return Err(MalformedReason::MissingKey(missing.clone()));
        }

        if let Some(check) = self.config.payload_check {
            check(&data).map_err(MalformedReason::Rejected)?;
        }

        Ok(data)
    }
}

/// Find the model's text output inside a vendor response envelope.
fn model_text(provider: ProviderId, envelope: &JsonValue) -> Option<&str> {
    match provider {
        ProviderId::OpenAi => envelope
            .pointer("/choices/0/message/content")
            .and_then(JsonValue::as_str),
        ProviderId::Claude => envelope
            .get("content")?
            .as_array()?
            .iter()
            .find(|block| block.get("type").and_then(JsonValue::as_str) == Some("text"))
            .and_then(|block| block.get("text"))
            .and_then(JsonValue::as_str),
        ProviderId::Gemini => envelope
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(JsonValue::as_str),
    }
}

/// Models sometimes wrap JSON in a Markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::fake::success_body;

    fn active(provider: ProviderId) -> ProviderConfig {
        ProviderConfig::enabled_with_key(provider, "sk-test")
    }

    fn success(provider: ProviderId, text: &str) -> RawOutcome {
        RawOutcome::HttpSuccess {
            status: 200,
            body: success_body(provider, text),
        }
    }

    fn classify(outcome: &RawOutcome) -> AiResponse {
        ResponseClassifier::default().classify(outcome, &active(ProviderId::OpenAi))
    }

    #[test]
    fn test_disabled_short_circuits_everything() {
        let classifier = ResponseClassifier::default();
        let config = ProviderConfig {
            enabled: false,
            ..active(ProviderId::OpenAi)
        };
        let outcome = success(ProviderId::OpenAi, r#"{"name": "Brisket"}"#);
        assert_eq!(
            classifier.classify(&outcome, &config).error_type(),
            Some(AiErrorType::Disabled)
        );
        // Disabled wins even when there is also no key.
        assert_eq!(
            classifier
                .classify(&outcome, &ProviderConfig::disabled(ProviderId::OpenAi))
                .error_type(),
            Some(AiErrorType::Disabled)
        );
    }

    #[test]
    fn test_missing_key_is_no_token() {
        let classifier = ResponseClassifier::default();
        let config = ProviderConfig {
            api_key: Some(String::new()),
            ..active(ProviderId::Claude)
        };
        let outcome = RawOutcome::HttpFailure {
            status: 401,
            body: vec![],
        };
        assert_eq!(
            classifier.classify(&outcome, &config).error_type(),
            Some(AiErrorType::NoToken)
        );
        assert_eq!(
            classifier.precheck(&config).and_then(|r| r.error_type()),
            Some(AiErrorType::NoToken)
        );
        assert!(classifier.precheck(&active(ProviderId::Claude)).is_none());
    }

    #[test]
    fn test_auth_failures() {
        for status in [401, 403] {
            let outcome = RawOutcome::HttpFailure {
                status,
                body: br#"{"error": "bad key"}"#.to_vec(),
            };
            let response = classify(&outcome);
            assert_eq!(response.error_type(), Some(AiErrorType::InvalidToken));
            assert!(matches!(
                response,
                AiResponse::Error { raw_error: Some(raw), .. } if raw.contains("bad key")
            ));
        }
    }

    #[test]
    fn test_rate_limited() {
        let outcome = RawOutcome::HttpFailure {
            status: 429,
            body: vec![],
        };
        assert_eq!(
            classify(&outcome).error_type(),
            Some(AiErrorType::RateLimited)
        );
    }

    #[test]
    fn test_transport_errors() {
        let cases = [
            (TransportErrorKind::Dns, AiErrorType::NoInternet),
            (TransportErrorKind::ConnectTimeout, AiErrorType::NoInternet),
            (TransportErrorKind::ReadTimeout, AiErrorType::Timeout),
            (TransportErrorKind::Cancelled, AiErrorType::Unknown),
        ];
        for (kind, expected) in cases {
            assert_eq!(
                classify(&RawOutcome::TransportError(kind)).error_type(),
                Some(expected),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn test_response_too_large() {
        let classifier = ResponseClassifier::new(ClassifierConfig {
            max_body_bytes: 16,
            ..Default::default()
        });
        let outcome = success(ProviderId::OpenAi, r#"{"name": "Pulled Pork"}"#);
        assert_eq!(
            classifier
                .classify(&outcome, &active(ProviderId::OpenAi))
                .error_type(),
            Some(AiErrorType::ResponseTooLarge)
        );
    }

    #[test]
    fn test_malformed_keeps_raw_body() {
        let outcome = RawOutcome::HttpSuccess {
            status: 200,
            body: b"<html>gateway hiccup</html>".to_vec(),
        };
        match classify(&outcome) {
            AiResponse::Error {
                error_type,
                raw_error,
                ..
            } => {
                assert_eq!(error_type, AiErrorType::MalformedResponse);
                assert_eq!(raw_error.as_deref(), Some("<html>gateway hiccup</html>"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_variants() {
        let cases = [
            // Envelope without model text
            RawOutcome::HttpSuccess {
                status: 200,
                body: br#"{"choices": []}"#.to_vec(),
            },
            // Model text is not JSON
            success(ProviderId::OpenAi, "Sure! Here is your recipe."),
            // Model text is a JSON array
            success(ProviderId::OpenAi, r#"[{"name": "Ribs"}]"#),
            // Missing the required "name" key
            success(ProviderId::OpenAi, r#"{"directions": ["Smoke it"]}"#),
        ];
        for outcome in cases {
            assert_eq!(
                classify(&outcome).error_type(),
                Some(AiErrorType::MalformedResponse),
                "{:?}",
                outcome
            );
        }
    }

    #[test]
    fn test_payload_check_rejects_wrong_shape() {
        fn directions_are_a_list(data: &Map<String, JsonValue>) -> Result<(), String> {
            match data.get("directions") {
                None | Some(JsonValue::Array(_)) => Ok(()),
                Some(other) => Err(format!("directions is {}", other)),
            }
        }

        let classifier = ResponseClassifier::default().with_payload_check(directions_are_a_list);
        let config = active(ProviderId::OpenAi);

        let bad = success(
            ProviderId::OpenAi,
            r#"{"name": "Ribs", "directions": {"step": "smoke"}}"#,
        );
        assert_eq!(
            classifier.classify(&bad, &config).error_type(),
            Some(AiErrorType::MalformedResponse)
        );

        let good = success(
            ProviderId::OpenAi,
            r#"{"name": "Ribs", "directions": ["Smoke it"]}"#,
        );
        assert!(classifier.classify(&good, &config).is_success());
    }

    #[test]
    fn test_success_for_each_vendor_envelope() {
        let classifier = ResponseClassifier::default();
        for provider in ProviderId::ALL {
            let outcome = success(*provider, r#"{"name": "Smoked Salmon", "time": "4 hours"}"#);
            let response = classifier.classify(&outcome, &active(*provider));
            let data = response.data().expect("success");
            assert_eq!(data["name"], "Smoked Salmon");
            assert_eq!(data["time"], "4 hours");
        }
    }

    #[test]
    fn test_success_inside_code_fence() {
        let text = "```json\n{\"name\": \"Beef Jerky\"}\n```";
        let response = classify(&success(ProviderId::OpenAi, text));
        assert_eq!(response.data().unwrap()["name"], "Beef Jerky");
    }

    #[test]
    fn test_claude_skips_non_text_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "{\"name\": \"Ribs\"}"}
            ]
        })
        .to_string()
        .into_bytes();
        let response = ResponseClassifier::default().classify(
            &RawOutcome::HttpSuccess { status: 200, body },
            &active(ProviderId::Claude),
        );
        assert!(response.is_success());
    }

    #[test]
    fn test_other_http_failures_are_unknown() {
        let outcome = RawOutcome::HttpFailure {
            status: 503,
            body: b"overloaded".to_vec(),
        };
        match classify(&outcome) {
            AiResponse::Error {
                error_type,
                raw_error,
                ..
            } => {
                assert_eq!(error_type, AiErrorType::Unknown);
                assert_eq!(raw_error.as_deref(), Some("HTTP 503: overloaded"));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = ResponseClassifier::default();
        let config = active(ProviderId::Gemini);
        let outcomes = [
            success(ProviderId::Gemini, r#"{"name": "Brisket"}"#),
            RawOutcome::HttpFailure {
                status: 429,
                body: vec![],
            },
            RawOutcome::TransportError(TransportErrorKind::ReadTimeout),
        ];
        for outcome in &outcomes {
            assert_eq!(
                classifier.classify(outcome, &config),
                classifier.classify(outcome, &config)
            );
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
    }
}
