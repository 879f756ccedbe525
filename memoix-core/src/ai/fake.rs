//! Fake provider clients for testing.
//!
//! Outcomes are scripted per provider, so tests run without network access or
//! API costs. Every call is recorded in a shared log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::provider::{ProviderClient, ProviderClientFactory, RawOutcome};
use super::types::ProviderRequest;
use crate::settings::{ProviderConfig, ProviderId};

/// A scripted response for one provider.
#[derive(Debug, Clone)]
struct Script {
    outcome: RawOutcome,
    delay: Option<Duration>,
}

/// Factory handing out [`FakeProviderClient`]s with scripted outcomes.
#[derive(Debug, Default, Clone)]
pub struct FakeProviderFactory {
    scripts: HashMap<ProviderId, Script>,
    calls: Arc<Mutex<Vec<ProviderId>>>,
}

impl FakeProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome every call to `provider` returns.
    pub fn with_outcome(mut self, provider: ProviderId, outcome: RawOutcome) -> Self {
        self.scripts.insert(
            provider,
            Script {
                outcome,
                delay: None,
            },
        );
        self
    }

    /// Script an outcome that only arrives after `delay`.
    pub fn with_delayed_outcome(
        mut self,
        provider: ProviderId,
        outcome: RawOutcome,
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            provider,
            Script {
                outcome,
                delay: Some(delay),
            },
        );
        self
    }

    /// Script a successful response whose model text is `text`.
    pub fn with_model_text(self, provider: ProviderId, text: &str) -> Self {
        self.with_outcome(
            provider,
            RawOutcome::HttpSuccess {
                status: 200,
                body: success_body(provider, text),
            },
        )
    }

    /// Providers called so far, in call order.
    pub fn calls(&self) -> Vec<ProviderId> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ProviderClientFactory for FakeProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Box<dyn ProviderClient> {
        Box::new(FakeProviderClient {
            provider: config.provider,
            script: self.scripts.get(&config.provider).cloned(),
            calls: Arc::clone(&self.calls),
        })
    }
}

/// A provider client that returns its scripted outcome.
#[derive(Debug)]
pub struct FakeProviderClient {
    provider: ProviderId,
    script: Option<Script>,
    calls: Arc<Mutex<Vec<ProviderId>>>,
}

#[async_trait]
impl ProviderClient for FakeProviderClient {
    async fn call(&self, _request: &ProviderRequest) -> RawOutcome {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(self.provider);

        match &self.script {
            Some(script) => {
                if let Some(delay) = script.delay {
                    tokio::time::sleep(delay).await;
                }
                script.outcome.clone()
            }
            None => RawOutcome::HttpFailure {
                status: 500,
                body: format!("FakeProviderClient: no outcome scripted for {}", self.provider)
                    .into_bytes(),
            },
        }
    }

    fn provider(&self) -> ProviderId {
        self.provider
    }
}

/// A response body in `provider`'s envelope format carrying `text` as the
/// model output.
pub fn success_body(provider: ProviderId, text: &str) -> Vec<u8> {
    let envelope = match provider {
        ProviderId::OpenAi => json!({
            "id": "chatcmpl-fake",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        }),
        ProviderId::Claude => json!({
            "id": "msg_fake",
            "content": [{"type": "text", "text": text}]
        }),
        ProviderId::Gemini => json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        }),
    };
    envelope.to_string().into_bytes()
}
