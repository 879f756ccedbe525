//! AI import configuration from environment variables.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::settings::{default_settings_path, ProviderId};

/// Default wall-clock budget for one provider call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default ceiling on a provider response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Where and which model to call for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
}

impl ProviderEndpoint {
    pub fn default_for(provider: ProviderId) -> Self {
        let (base_url, model) = match provider {
            ProviderId::OpenAi => ("https://api.openai.com/v1", "gpt-4o-mini"),
            ProviderId::Claude => ("https://api.anthropic.com/v1", "claude-3-5-sonnet-20241022"),
            ProviderId::Gemini => (
                "https://generativelanguage.googleapis.com/v1beta",
                "gemini-1.5-flash",
            ),
        };
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
        }
    }
}

/// Import pipeline configuration.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Budget for a single provider call.
    pub timeout: Duration,
    /// Bodies larger than this are classified as `responseTooLarge`.
    pub max_response_bytes: usize,
    /// Per-provider endpoint and model.
    pub endpoints: BTreeMap<ProviderId, ProviderEndpoint>,
    /// Location of the JSON settings file.
    pub settings_path: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            endpoints: ProviderId::ALL
                .iter()
                .map(|p| (*p, ProviderEndpoint::default_for(*p)))
                .collect(),
            settings_path: default_settings_path(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from environment variables.
    ///
    /// All optional:
    /// - `MEMOIX_AI_TIMEOUT_SECS`: per-call budget (default: 30)
    /// - `MEMOIX_AI_MAX_RESPONSE_BYTES`: response ceiling (default: 2 MiB)
    /// - `MEMOIX_{OPENAI,CLAUDE,GEMINI}_MODEL`: model name per provider
    /// - `MEMOIX_{OPENAI,CLAUDE,GEMINI}_BASE_URL`: API base URL per provider
    /// - `MEMOIX_SETTINGS_PATH`: settings file (default: "~/.memoix/import_settings.json")
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64>("MEMOIX_AI_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(bytes) = parse_var::<usize>("MEMOIX_AI_MAX_RESPONSE_BYTES")? {
            config.max_response_bytes = bytes;
        }

        for provider in ProviderId::ALL {
            let prefix = format!("MEMOIX_{}", provider.as_str().to_uppercase());
            let endpoint = config
                .endpoints
                .entry(*provider)
                .or_insert_with(|| ProviderEndpoint::default_for(*provider));
            if let Ok(model) = env::var(format!("{}_MODEL", prefix)) {
                endpoint.model = model;
            }
            if let Ok(base_url) = env::var(format!("{}_BASE_URL", prefix)) {
                endpoint.base_url = base_url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(path) = env::var("MEMOIX_SETTINGS_PATH") {
            config.settings_path = PathBuf::from(path);
        }

        Ok(config)
    }

    pub fn endpoint(&self, provider: ProviderId) -> ProviderEndpoint {
        self.endpoints
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderEndpoint::default_for(provider))
    }
}

fn parse_var<T: std::str::FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_response_bytes, 2 * 1024 * 1024);
        assert_eq!(config.endpoints.len(), ProviderId::ALL.len());
        assert_eq!(
            config.endpoint(ProviderId::Claude).base_url,
            "https://api.anthropic.com/v1"
        );
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // Unique name so parallel tests don't race on it.
        env::set_var("MEMOIX_TEST_PARSE_VAR_GARBAGE", "soon");
        let err = parse_var::<u64>("MEMOIX_TEST_PARSE_VAR_GARBAGE").unwrap_err();
        assert!(err.to_string().contains("MEMOIX_TEST_PARSE_VAR_GARBAGE"));
        env::remove_var("MEMOIX_TEST_PARSE_VAR_GARBAGE");

        assert!(parse_var::<u64>("MEMOIX_TEST_PARSE_VAR_UNSET")
            .unwrap()
            .is_none());
    }
}
