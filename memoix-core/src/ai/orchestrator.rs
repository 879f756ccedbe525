//! Sequential provider fallback for one AI import.
//!
//! The orchestrator walks the candidate providers one at a time. The first
//! success ends the run. Provider-specific failures move on to the next
//! candidate; environment failures (`noInternet`, `timeout`) and cancellation
//! end the run immediately.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::classifier::{PayloadCheck, ResponseClassifier};
use super::config::ImportConfig;
use super::provider::{
    HttpProviderFactory, ProviderClientFactory, RawOutcome, TransportErrorKind,
};
use super::types::{AiErrorType, AiResponse, ProviderRequest};
use crate::settings::{ImportSettings, ProviderId};

/// Record of one provider considered during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    /// False when the provider was rejected before any request was made.
    pub network_call: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<AiErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl ProviderAttempt {
    fn new(
        provider: ProviderId,
        network_call: bool,
        response: &AiResponse,
        started: Instant,
    ) -> Self {
        let (error_type, error) = match response {
            AiResponse::Success { .. } => (None, None),
            AiResponse::Error {
                message,
                error_type,
                ..
            } => (Some(*error_type), Some(message.clone())),
        };
        Self {
            provider,
            network_call,
            success: response.is_success(),
            error_type,
            error,
            cancelled: false,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Outcome of one import run.
#[derive(Debug, Clone)]
pub struct ImportRun {
    /// The first success, or the error that ended the run.
    pub response: AiResponse,
    /// The provider that produced a successful response.
    pub provider: Option<ProviderId>,
    /// Every provider considered, in order.
    pub attempts: Vec<ProviderAttempt>,
    pub cancelled: bool,
}

impl ImportRun {
    fn finished(
        response: AiResponse,
        provider: Option<ProviderId>,
        attempts: Vec<ProviderAttempt>,
    ) -> Self {
        Self {
            response,
            provider,
            attempts,
            cancelled: false,
        }
    }

    fn cancelled_run(attempts: Vec<ProviderAttempt>) -> Self {
        Self {
            response: AiResponse::Error {
                message: "Import cancelled".to_string(),
                error_type: AiErrorType::Unknown,
                raw_error: None,
            },
            provider: None,
            attempts,
            cancelled: true,
        }
    }

    /// Number of requests actually sent.
    pub fn network_calls(&self) -> usize {
        self.attempts.iter().filter(|a| a.network_call).count()
    }
}

/// Drives provider calls for AI imports.
///
/// Holds no per-run state, so one orchestrator can serve concurrent runs.
pub struct ImportOrchestrator {
    factory: Arc<dyn ProviderClientFactory>,
    classifier: ResponseClassifier,
}

impl ImportOrchestrator {
    pub fn new(factory: Arc<dyn ProviderClientFactory>, classifier: ResponseClassifier) -> Self {
        Self {
            factory,
            classifier,
        }
    }

    /// An orchestrator calling the real vendor APIs.
    pub fn from_config(config: ImportConfig) -> Self {
        let classifier = ResponseClassifier::from_import_config(&config);
        Self::new(Arc::new(HttpProviderFactory::new(config)), classifier)
    }

    /// Reject success payloads that fail `check`, so they fall through to the
    /// next provider.
    pub fn with_payload_check(mut self, check: PayloadCheck) -> Self {
        self.classifier = self.classifier.with_payload_check(check);
        self
    }

    /// Providers to try, in order.
    ///
    /// The preferred provider always comes first, even when inactive, so its
    /// rejection shows up in the attempt log. With auto-select, the remaining
    /// active providers follow in [`ProviderId::ALL`] order; inactive ones are
    /// left out entirely.
    pub fn candidate_order(settings: &ImportSettings) -> Vec<ProviderId> {
        let mut order: Vec<ProviderId> = settings.preferred_provider.into_iter().collect();
        if settings.auto_select {
            for provider in settings.active_providers() {
                if !order.contains(&provider) {
                    order.push(provider);
                }
            }
        }
        order
    }

    /// Run one import against the providers in `settings`.
    ///
    /// `settings` is treated as a snapshot for the whole run. Each provider is
    /// called at most once. Cancelling `cancel` aborts the in-flight call and
    /// ends the run without trying further providers.
    pub async fn import_from(
        &self,
        settings: &ImportSettings,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> ImportRun {
        let candidates = Self::candidate_order(settings);
        let mut attempts = Vec::with_capacity(candidates.len());

        if candidates.is_empty() {
            tracing::info!("No AI provider available for import");
            return ImportRun::finished(
                AiResponse::Error {
                    message: "No AI provider is configured".to_string(),
                    error_type: AiErrorType::NoToken,
                    raw_error: None,
                },
                None,
                attempts,
            );
        }

        let mut last_error = None;

        for provider in candidates {
            if cancel.is_cancelled() {
                tracing::info!("Import cancelled before trying {}", provider);
                return ImportRun::cancelled_run(attempts);
            }

            let config = settings.config_for(provider);
            let started = Instant::now();

            if let Some(response) = self.classifier.precheck(&config) {
                tracing::debug!(
                    provider = %provider,
                    error_type = ?response.error_type(),
                    "Skipping provider without a request"
                );
                attempts.push(ProviderAttempt::new(provider, false, &response, started));
                last_error = Some(response);
                continue;
            }

            let client = self.factory.create(&config);
            let call = client
                .call(request)
                .instrument(info_span!("provider_call", provider = %provider));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = call => Some(outcome),
            };

            let Some(outcome) = outcome else {
                tracing::info!(provider = %provider, "Import cancelled during provider call");
                let response = self
                    .classifier
                    .classify(&RawOutcome::TransportError(TransportErrorKind::Cancelled), &config);
                let mut attempt = ProviderAttempt::new(provider, true, &response, started);
                attempt.cancelled = true;
                attempts.push(attempt);
                return ImportRun::cancelled_run(attempts);
            };

            let response = self.classifier.classify(&outcome, &config);
            attempts.push(ProviderAttempt::new(provider, true, &response, started));

            match response.error_type() {
                None => {
                    tracing::info!(provider = %provider, "AI import succeeded");
                    return ImportRun::finished(response, Some(provider), attempts);
                }
                Some(error_type) if error_type.aborts_chain() => {
                    tracing::warn!(
                        provider = %provider,
                        error_type = %error_type,
                        "Environment error, not trying other providers"
                    );
                    return ImportRun::finished(response, None, attempts);
                }
                Some(error_type) => {
                    tracing::warn!(
                        provider = %provider,
                        error_type = %error_type,
                        "Provider failed, trying next candidate"
                    );
                    last_error = Some(response);
                }
            }
        }

        let response = last_error.unwrap_or_else(|| AiResponse::error(AiErrorType::Unknown));
        ImportRun::finished(response, None, attempts)
    }
}
