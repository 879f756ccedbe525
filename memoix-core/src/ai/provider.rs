//! Provider clients: one HTTP call to one AI vendor.
//!
//! A client only distinguishes transport-level success from failure. It never
//! looks inside the body; that is the classifier's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::config::{ImportConfig, ProviderEndpoint};
use super::types::{ProviderRequest, Role};
use crate::settings::{ProviderConfig, ProviderId};

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Dns,
    ConnectTimeout,
    ReadTimeout,
    Cancelled,
}

/// What came back from a single provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutcome {
    HttpSuccess { status: u16, body: Vec<u8> },
    HttpFailure { status: u16, body: Vec<u8> },
    TransportError(TransportErrorKind),
}

impl RawOutcome {
    /// Sort a completed HTTP exchange into success or failure by status.
    pub fn from_status(status: u16, body: Vec<u8>) -> Self {
        if (200..300).contains(&status) {
            RawOutcome::HttpSuccess { status, body }
        } else {
            RawOutcome::HttpFailure { status, body }
        }
    }

    fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            if err.is_connect() {
                RawOutcome::TransportError(TransportErrorKind::ConnectTimeout)
            } else {
                RawOutcome::TransportError(TransportErrorKind::ReadTimeout)
            }
        } else if err.is_connect() {
            RawOutcome::TransportError(TransportErrorKind::Dns)
        } else {
            RawOutcome::HttpFailure {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                body: err.to_string().into_bytes(),
            }
        }
    }
}

/// A client for one AI vendor.
///
/// Implementations make exactly one request per `call` and never retry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(&self, request: &ProviderRequest) -> RawOutcome;

    fn provider(&self) -> ProviderId;
}

/// Builds a fresh client for a provider. Each import run asks for its own
/// clients, so runs never share client state.
pub trait ProviderClientFactory: Send + Sync {
    fn create(&self, config: &ProviderConfig) -> Box<dyn ProviderClient>;
}

/// HTTP client for one vendor's chat API.
#[derive(Debug)]
pub struct HttpProviderClient {
    provider: ProviderId,
    api_key: String,
    endpoint: ProviderEndpoint,
    timeout: Duration,
    max_body_bytes: usize,
    client: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new(
        provider: ProviderId,
        api_key: String,
        endpoint: ProviderEndpoint,
        timeout: Duration,
        max_body_bytes: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client, using defaults");
                reqwest::Client::new()
            });

        Self {
            provider,
            api_key,
            endpoint,
            timeout,
            max_body_bytes,
            client,
        }
    }

    fn build_request(&self, request: &ProviderRequest) -> reqwest::RequestBuilder {
        let base = self.endpoint.base_url.trim_end_matches('/');
        match self.provider {
            ProviderId::OpenAi => self
                .client
                .post(format!("{}/chat/completions", base))
                .bearer_auth(&self.api_key)
                .json(&OpenAiRequest::new(&self.endpoint.model, request)),
            ProviderId::Claude => self
                .client
                .post(format!("{}/messages", base))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&ClaudeRequest::new(&self.endpoint.model, request)),
            ProviderId::Gemini => self
                .client
                .post(format!(
                    "{}/models/{}:generateContent",
                    base, self.endpoint.model
                ))
                .header("x-goog-api-key", &self.api_key)
                .json(&GeminiRequest::new(request)),
        }
    }

    /// Send the request and read at most `max_body_bytes + 1` bytes of body,
    /// enough for the classifier to notice an oversized response.
    async fn send(&self, request: &ProviderRequest) -> Result<(u16, Vec<u8>), reqwest::Error> {
        let mut response = self.build_request(request).send().await?;
        let status = response.status().as_u16();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_body_bytes {
                tracing::debug!(
                    provider = %self.provider,
                    limit = self.max_body_bytes,
                    "Response exceeded size limit, stopped reading"
                );
                break;
            }
        }

        Ok((status, body))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn call(&self, request: &ProviderRequest) -> RawOutcome {
        tracing::debug!(
            provider = %self.provider,
            model = %self.endpoint.model,
            "Calling AI provider"
        );

        match tokio::time::timeout(self.timeout, self.send(request)).await {
            Err(_) => RawOutcome::TransportError(TransportErrorKind::ReadTimeout),
            Ok(Err(e)) => RawOutcome::from_reqwest_error(&e),
            Ok(Ok((status, body))) => RawOutcome::from_status(status, body),
        }
    }

    fn provider(&self) -> ProviderId {
        self.provider
    }
}

/// Factory producing [`HttpProviderClient`]s from an [`ImportConfig`].
pub struct HttpProviderFactory {
    config: ImportConfig,
}

impl HttpProviderFactory {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }
}

impl ProviderClientFactory for HttpProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Box<dyn ProviderClient> {
        Box::new(HttpProviderClient::new(
            config.provider,
            config.api_key.clone().unwrap_or_default(),
            self.config.endpoint(config.provider),
            self.config.timeout,
            self.config.max_response_bytes,
        ))
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: OpenAiResponseFormat,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl OpenAiRequest {
    fn new(model: &str, request: &ProviderRequest) -> Self {
        Self {
            model: model.to_string(),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::User => "user",
                    },
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: OpenAiResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: &'static str,
    content: String,
}

impl ClaudeRequest {
    fn new(model: &str, request: &ProviderRequest) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system_text(),
            messages: vec![ClaudeMessage {
                role: "user",
                content: request.user_text(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    response_mime_type: &'static str,
}

impl GeminiRequest {
    fn new(request: &ProviderRequest) -> Self {
        Self {
            system_instruction: request.system_text().map(|text| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text }],
            }),
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: request.user_text(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                response_mime_type: "application/json",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::ChatMessage;

    fn request() -> ProviderRequest {
        ProviderRequest {
            messages: vec![
                ChatMessage::system("Extract recipes."),
                ChatMessage::user("Smoked brisket..."),
            ],
            max_tokens: 512,
            temperature: 0.1,
        }
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            RawOutcome::from_status(200, vec![]),
            RawOutcome::HttpSuccess { status: 200, .. }
        ));
        assert!(matches!(
            RawOutcome::from_status(204, vec![]),
            RawOutcome::HttpSuccess { .. }
        ));
        assert!(matches!(
            RawOutcome::from_status(401, vec![]),
            RawOutcome::HttpFailure { status: 401, .. }
        ));
        assert!(matches!(
            RawOutcome::from_status(302, vec![]),
            RawOutcome::HttpFailure { .. }
        ));
    }

    #[test]
    fn test_openai_request_shape() {
        let body = serde_json::to_value(OpenAiRequest::new("gpt-4o-mini", &request())).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Smoked brisket...");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_claude_request_moves_system_prompt() {
        let body = serde_json::to_value(ClaudeRequest::new("claude", &request())).unwrap();
        assert_eq!(body["system"], "Extract recipes.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 512);
    }

    #[test]
    fn test_gemini_request_shape() {
        let body = serde_json::to_value(GeminiRequest::new(&request())).unwrap();
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "Extract recipes."
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 on localhost is "discard"; nothing listens there in CI.
        let client = HttpProviderClient::new(
            ProviderId::OpenAi,
            "sk-test".to_string(),
            ProviderEndpoint {
                base_url: "http://127.0.0.1:9".to_string(),
                model: "gpt-4o-mini".to_string(),
            },
            Duration::from_secs(5),
            1024,
        );
        let outcome = client.call(&request()).await;
        assert!(matches!(outcome, RawOutcome::TransportError(_)));
    }
}
