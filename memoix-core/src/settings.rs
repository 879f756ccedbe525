//! Import settings: per-provider credentials and provider preferences.
//!
//! Settings are persisted as a JSON object:
//!
//! ```json
//! {
//!   "providers": {
//!     "openai": {"apiKey": "sk-...", "enabled": true, "validatedAt": "2024-05-01T12:00:00Z"}
//!   },
//!   "preferredProvider": "openai",
//!   "autoSelect": true
//! }
//! ```
//!
//! Provider names are validated against [`ProviderId`] at load time. An unknown
//! provider name is an error, not something to skip.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the settings change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Unknown AI provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid settings JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The AI vendors the import pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProviderId {
    OpenAi,
    Claude,
    Gemini,
}

impl ProviderId {
    /// All providers, in the order auto-select tries them.
    pub const ALL: &'static [ProviderId] =
        &[ProviderId::OpenAi, ProviderId::Claude, ProviderId::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Claude => "claude",
            ProviderId::Gemini => "gemini",
        }
    }

    /// Source identifier recorded on results produced by this provider.
    pub fn source_id(&self) -> String {
        format!("ai:{}", self.as_str())
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderId::OpenAi),
            "claude" => Ok(ProviderId::Claude),
            "gemini" => Ok(ProviderId::Gemini),
            other => Err(SettingsError::UnknownProvider(other.to_string())),
        }
    }
}

impl Serialize for ProviderId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Credentials and on/off switch for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderId,
    pub api_key: Option<String>,
    pub enabled: bool,
    pub validated_at: Option<DateTime<Utc>>,
}

impl ProviderConfig {
    /// The config used for a provider that has no stored entry.
    pub fn disabled(provider: ProviderId) -> Self {
        Self {
            provider,
            api_key: None,
            enabled: false,
            validated_at: None,
        }
    }

    /// An enabled provider with the given key.
    pub fn enabled_with_key(provider: ProviderId, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: Some(api_key.into()),
            enabled: true,
            validated_at: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.is_configured()
    }
}

/// Provider preferences for AI import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSettings {
    /// Keyed by provider; each value's `provider` equals its key.
    providers: BTreeMap<ProviderId, ProviderConfig>,
    pub preferred_provider: Option<ProviderId>,
    pub auto_select: bool,
}

impl ImportSettings {
    /// Settings with no provider entries yet.
    pub fn new(preferred_provider: Option<ProviderId>, auto_select: bool) -> Self {
        Self {
            providers: BTreeMap::new(),
            preferred_provider,
            auto_select,
        }
    }

    pub fn with_preferred(mut self, provider: Option<ProviderId>) -> Self {
        self.preferred_provider = provider;
        self
    }

    pub fn with_auto_select(mut self, auto_select: bool) -> Self {
        self.auto_select = auto_select;
        self
    }

    /// Insert or replace the entry for `config.provider`.
    pub fn set_provider(&mut self, config: ProviderConfig) {
        self.providers.insert(config.provider, config);
    }

    pub fn with_provider(mut self, config: ProviderConfig) -> Self {
        self.set_provider(config);
        self
    }

    pub fn remove_provider(&mut self, provider: ProviderId) -> Option<ProviderConfig> {
        self.providers.remove(&provider)
    }

    /// Stored entries only, in provider order.
    pub fn providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.values()
    }

    /// Config for `provider`; a missing entry means a disabled, unconfigured provider.
    pub fn config_for(&self, provider: ProviderId) -> ProviderConfig {
        self.providers
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderConfig::disabled(provider))
    }

    /// Active providers in [`ProviderId::ALL`] order.
    pub fn active_providers(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .iter()
            .copied()
            .filter(|p| self.config_for(*p).is_active())
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let stored: StoredSettings = serde_json::from_str(json)?;
        stored.try_into()
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(&StoredSettings::from(self))?)
    }
}

/// On-disk shape of [`ImportSettings`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StoredSettings {
    #[serde(default)]
    providers: BTreeMap<String, StoredProviderConfig>,
    #[serde(default)]
    preferred_provider: Option<String>,
    #[serde(default)]
    auto_select: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StoredProviderConfig {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    validated_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoredSettings> for ImportSettings {
    type Error = SettingsError;

    fn try_from(stored: StoredSettings) -> Result<Self, Self::Error> {
        let mut providers = BTreeMap::new();
        for (name, entry) in stored.providers {
            let provider: ProviderId = name.parse()?;
            providers.insert(
                provider,
                ProviderConfig {
                    provider,
                    api_key: entry.api_key,
                    enabled: entry.enabled,
                    validated_at: entry.validated_at,
                },
            );
        }

        let preferred_provider = stored
            .preferred_provider
            .map(|name| name.parse::<ProviderId>())
            .transpose()?;

        Ok(Self {
            providers,
            preferred_provider,
            auto_select: stored.auto_select,
        })
    }
}

impl From<&ImportSettings> for StoredSettings {
    fn from(settings: &ImportSettings) -> Self {
        let providers = settings
            .providers
            .iter()
            .map(|(id, config)| {
                (
                    id.as_str().to_string(),
                    StoredProviderConfig {
                        api_key: config.api_key.clone(),
                        enabled: config.enabled,
                        validated_at: config.validated_at,
                    },
                )
            })
            .collect();

        Self {
            providers,
            preferred_provider: settings.preferred_provider.map(|p| p.as_str().to_string()),
            auto_select: settings.auto_select,
        }
    }
}

/// Loads and persists [`ImportSettings`].
///
/// Callers that need to react to edits subscribe to the change channel; each
/// successful `save` publishes the saved snapshot.
pub trait SettingsGateway: Send + Sync {
    fn load(&self) -> Result<ImportSettings, SettingsError>;

    fn save(&self, settings: &ImportSettings) -> Result<(), SettingsError>;

    fn subscribe(&self) -> broadcast::Receiver<ImportSettings>;
}

/// Settings stored in a JSON file.
pub struct JsonFileSettingsGateway {
    path: PathBuf,
    changes: broadcast::Sender<ImportSettings>,
}

impl JsonFileSettingsGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsGateway for JsonFileSettingsGateway {
    fn load(&self) -> Result<ImportSettings, SettingsError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No settings file, using defaults");
            return Ok(ImportSettings::default());
        }
        let json = fs::read_to_string(&self.path)?;
        ImportSettings::from_json(&json)
    }

    fn save(&self, settings: &ImportSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling file and rename so readers never see a partial file.
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, settings.to_json()?)?;
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), "Saved import settings");
        // No subscribers is fine.
        let _ = self.changes.send(settings.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ImportSettings> {
        self.changes.subscribe()
    }
}

/// Settings held in memory, for tests and embedders with their own storage.
pub struct InMemorySettingsGateway {
    current: RwLock<ImportSettings>,
    changes: broadcast::Sender<ImportSettings>,
}

impl InMemorySettingsGateway {
    pub fn new(initial: ImportSettings) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(initial),
            changes,
        }
    }
}

impl Default for InMemorySettingsGateway {
    fn default() -> Self {
        Self::new(ImportSettings::default())
    }
}

impl SettingsGateway for InMemorySettingsGateway {
    fn load(&self) -> Result<ImportSettings, SettingsError> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        Ok(current.clone())
    }

    fn save(&self, settings: &ImportSettings) -> Result<(), SettingsError> {
        {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            *current = settings.clone();
        }
        let _ = self.changes.send(settings.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ImportSettings> {
        self.changes.subscribe()
    }
}

/// Default settings file: ~/.memoix/import_settings.json
pub fn default_settings_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".memoix").join("import_settings.json"))
        .unwrap_or_else(|| PathBuf::from("data/import_settings.json"))
}
