//! AI request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Vendor-neutral request handed to every provider client.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProviderRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ProviderRequest {
    /// The system prompt, if any, joined into one string.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// All user messages joined into one string.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Closed set of failure categories every AI failure is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AiErrorType {
    NoToken,
    InvalidToken,
    RateLimited,
    NoInternet,
    Timeout,
    ResponseTooLarge,
    MalformedResponse,
    Disabled,
    Unknown,
}

impl AiErrorType {
    pub const ALL: &'static [AiErrorType] = &[
        AiErrorType::NoToken,
        AiErrorType::InvalidToken,
        AiErrorType::RateLimited,
        AiErrorType::NoInternet,
        AiErrorType::Timeout,
        AiErrorType::ResponseTooLarge,
        AiErrorType::MalformedResponse,
        AiErrorType::Disabled,
        AiErrorType::Unknown,
    ];

    /// Environment-level failures. Another provider would fail the same way,
    /// so the fallback chain stops here.
    pub fn aborts_chain(&self) -> bool {
        matches!(self, AiErrorType::NoInternet | AiErrorType::Timeout)
    }

    /// Short message suitable for the primary UI surface.
    pub fn default_message(&self) -> &'static str {
        match self {
            AiErrorType::NoToken => "No API key configured for this provider",
            AiErrorType::InvalidToken => "The API key was rejected by the provider",
            AiErrorType::RateLimited => "The provider is rate limiting requests",
            AiErrorType::NoInternet => "Could not reach the provider, check your connection",
            AiErrorType::Timeout => "The provider took too long to respond",
            AiErrorType::ResponseTooLarge => "The provider response was too large",
            AiErrorType::MalformedResponse => "The provider returned an unreadable response",
            AiErrorType::Disabled => "This provider is disabled",
            AiErrorType::Unknown => "Something went wrong while importing",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiErrorType::NoToken => "noToken",
            AiErrorType::InvalidToken => "invalidToken",
            AiErrorType::RateLimited => "rateLimited",
            AiErrorType::NoInternet => "noInternet",
            AiErrorType::Timeout => "timeout",
            AiErrorType::ResponseTooLarge => "responseTooLarge",
            AiErrorType::MalformedResponse => "malformedResponse",
            AiErrorType::Disabled => "disabled",
            AiErrorType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AiErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of one AI call: parsed data or a categorized error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AiResponse {
    Success {
        data: Map<String, JsonValue>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        error_type: AiErrorType,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_error: Option<String>,
    },
}

impl AiResponse {
    pub fn success(data: Map<String, JsonValue>) -> Self {
        AiResponse::Success { data }
    }

    /// Error with the type's default message.
    pub fn error(error_type: AiErrorType) -> Self {
        AiResponse::Error {
            message: error_type.default_message().to_string(),
            error_type,
            raw_error: None,
        }
    }

    /// Error with the type's default message and diagnostic text attached.
    pub fn error_with_raw(error_type: AiErrorType, raw_error: impl Into<String>) -> Self {
        AiResponse::Error {
            message: error_type.default_message().to_string(),
            error_type,
            raw_error: Some(raw_error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AiResponse::Success { .. })
    }

    pub fn error_type(&self) -> Option<AiErrorType> {
        match self {
            AiResponse::Success { .. } => None,
            AiResponse::Error { error_type, .. } => Some(*error_type),
        }
    }

    pub fn data(&self) -> Option<&Map<String, JsonValue>> {
        match self {
            AiResponse::Success { data } => Some(data),
            AiResponse::Error { .. } => None,
        }
    }
}
