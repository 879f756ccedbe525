use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use memoix_core::ai::ImportConfig;
use memoix_core::{
    classify_lines, ImportError, ImportSettings, Importer, JsonFileSettingsGateway, RecipeKind,
    SettingsGateway, SourcePayload,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

pub fn classify(lines: &[String]) -> Result<()> {
    let classified = classify_lines(&lines.join("\n"));
    println!("{}", serde_json::to_string_pretty(&classified)?);
    Ok(())
}

pub async fn import_text(file: &Path, source: String, kind: RecipeKind) -> Result<()> {
    let text = read_source(file)?;

    let config = ImportConfig::from_env().context("Invalid AI configuration")?;
    // Text imports never reach a provider, so no settings are needed.
    let importer = Importer::from_config(config);
    let payload = SourcePayload::Text { kind, source, text };

    let result = importer
        .import_from(&ImportSettings::default(), payload, &CancellationToken::new())
        .await
        .context("Text import failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn import_ai(file: &Path, kind: RecipeKind, settings: Option<PathBuf>) -> Result<()> {
    let source_text = read_source(file)?;
    let config = ImportConfig::from_env().context("Invalid AI configuration")?;

    let settings_path = settings.unwrap_or_else(|| config.settings_path.clone());
    let gateway = JsonFileSettingsGateway::new(&settings_path);
    let settings = gateway
        .load()
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    let importer = Importer::from_config(config);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, cancelling import");
            on_ctrl_c.cancel();
        }
    });

    let payload = SourcePayload::Ai { kind, source_text };
    match importer.import_from(&settings, payload, &cancel).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(ImportError::Ai {
            message,
            error_type,
            raw_error,
        }) => {
            let error = json!({
                "status": "error",
                "errorType": error_type,
                "message": message,
                "rawError": raw_error,
            });
            println!("{}", serde_json::to_string_pretty(&error)?);
            bail!("AI import failed: {}", message)
        }
        Err(e) => Err(e).context("AI import failed"),
    }
}

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}
