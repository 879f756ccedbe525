//! AI-assisted recipe import.
//!
//! This module provides:
//! - `ProviderClient` trait with an HTTP implementation per vendor (OpenAI,
//!   Claude, Gemini) and a scripted fake for tests
//! - `ResponseClassifier`, which maps every raw outcome onto one `AiErrorType`
//!   or a successful JSON payload
//! - `ImportOrchestrator`, which walks the providers with the fallback policy
//! - Configuration via environment variables
//! - The recipe extraction prompt
//!
//! # Configuration
//!
//! API keys live in the import settings file, not the environment. These
//! environment variables are optional:
//!
//! - `MEMOIX_AI_TIMEOUT_SECS`: Per-call timeout in seconds (default 30)
//! - `MEMOIX_AI_MAX_RESPONSE_BYTES`: Response size limit (default 2 MiB)
//! - `MEMOIX_OPENAI_MODEL`, `MEMOIX_CLAUDE_MODEL`, `MEMOIX_GEMINI_MODEL`
//! - `MEMOIX_OPENAI_BASE_URL`, `MEMOIX_CLAUDE_BASE_URL`, `MEMOIX_GEMINI_BASE_URL`
//! - `MEMOIX_SETTINGS_PATH`: Settings file (default `~/.memoix/import_settings.json`)
//!
//! # Example
//!
//! ```ignore
//! use memoix_core::ai::{build_recipe_extract_request, ImportConfig, ImportOrchestrator};
//!
//! let config = ImportConfig::from_env()?;
//! let orchestrator = ImportOrchestrator::from_config(config);
//!
//! let request = build_recipe_extract_request(RecipeKind::Smoking, &text);
//! let run = orchestrator.import_from(&settings, &request, &cancel).await;
//! println!("{} attempts", run.attempts.len());
//! ```

mod classifier;
mod config;
pub mod fake;
mod orchestrator;
pub mod prompts;
mod provider;
mod types;

pub use classifier::{ClassifierConfig, PayloadCheck, ResponseClassifier};
pub use config::{ConfigError, ImportConfig, ProviderEndpoint};
pub use fake::FakeProviderFactory;
pub use orchestrator::{ImportOrchestrator, ImportRun, ProviderAttempt};
pub use prompts::{build_recipe_extract_request, RECIPE_EXTRACT_PROMPT_NAME};
pub use provider::{
    HttpProviderClient, HttpProviderFactory, ProviderClient, ProviderClientFactory, RawOutcome,
    TransportErrorKind,
};
pub use types::{AiErrorType, AiResponse, ChatMessage, ProviderRequest, Role};
