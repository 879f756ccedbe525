use std::path::PathBuf;

use anyhow::{Context, Result};
use memoix_core::ai::ImportConfig;
use memoix_core::{ImportSettings, JsonFileSettingsGateway, ProviderConfig, SettingsGateway};

use crate::SettingsCommand;

pub fn run(path: Option<PathBuf>, command: SettingsCommand) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => {
            ImportConfig::from_env()
                .context("Invalid AI configuration")?
                .settings_path
        }
    };
    let gateway = JsonFileSettingsGateway::new(&path);
    let mut settings = gateway
        .load()
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    match command {
        SettingsCommand::Show => {
            println!("{}", masked(&settings).to_json()?);
            return Ok(());
        }
        SettingsCommand::SetKey { provider, key } => {
            let mut config = settings.config_for(provider);
            config.api_key = Some(key.trim().to_string());
            // A new key has not been checked against the vendor yet.
            config.validated_at = None;
            settings.set_provider(config);
        }
        SettingsCommand::Enable { provider } => {
            let mut config = settings.config_for(provider);
            config.enabled = true;
            if !config.is_configured() {
                eprintln!(
                    "Warning: {} has no API key; set one with `memoix settings set-key`",
                    provider
                );
            }
            settings.set_provider(config);
        }
        SettingsCommand::Disable { provider } => {
            let mut config = settings.config_for(provider);
            config.enabled = false;
            settings.set_provider(config);
        }
        SettingsCommand::Prefer { provider } => {
            settings.preferred_provider = provider;
        }
        SettingsCommand::AutoSelect { enabled } => {
            settings.auto_select = enabled;
        }
    }

    gateway
        .save(&settings)
        .with_context(|| format!("Failed to save settings to {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}

/// A copy of `settings` safe to print.
fn masked(settings: &ImportSettings) -> ImportSettings {
    let mut masked = settings.clone();
    for config in settings.providers() {
        masked.set_provider(ProviderConfig {
            api_key: config.api_key.as_deref().map(mask_key),
            ..config.clone()
        });
    }
    masked
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}
