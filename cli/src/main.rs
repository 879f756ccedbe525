mod import;
mod settings;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use memoix_core::{ProviderId, RecipeKind};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "memoix")]
#[command(about = "Memoix recipe import CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify ingredient lines and print them as JSON
    Classify {
        /// Ingredient lines, e.g. "2 tablespoons kosher salt"
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// Import a recipe from scraped or OCR text without calling any AI provider
    ImportText {
        /// File containing the recipe text
        #[arg(long)]
        file: PathBuf,
        /// Where the text came from (a URL, or "ocr")
        #[arg(long, default_value = "ocr")]
        source: String,
        /// Recipe kind: standard or smoking
        #[arg(long, default_value = "standard")]
        kind: RecipeKind,
    },
    /// Import a recipe by sending its text to the configured AI providers.
    /// Press Ctrl-C to cancel.
    ImportAi {
        /// File containing the recipe text
        #[arg(long)]
        file: PathBuf,
        /// Recipe kind: standard or smoking
        #[arg(long, default_value = "standard")]
        kind: RecipeKind,
        /// Settings file (default: $MEMOIX_SETTINGS_PATH or ~/.memoix/import_settings.json)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// View or edit AI provider settings
    Settings {
        /// Settings file (default: $MEMOIX_SETTINGS_PATH or ~/.memoix/import_settings.json)
        #[arg(long, global = true)]
        path: Option<PathBuf>,
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the settings with API keys masked
    Show,
    /// Store an API key for a provider
    SetKey {
        /// openai, claude or gemini
        provider: ProviderId,
        key: String,
    },
    /// Enable a provider
    Enable { provider: ProviderId },
    /// Disable a provider without forgetting its key
    Disable { provider: ProviderId },
    /// Set the preferred provider; omit to clear it
    Prefer { provider: Option<ProviderId> },
    /// Turn falling back to other providers on or off
    AutoSelect {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

fn init_tracing() {
    // Logs go to stderr so stdout stays valid JSON.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { lines } => {
            import::classify(&lines)?;
        }
        Commands::ImportText { file, source, kind } => {
            import::import_text(&file, source, kind).await?;
        }
        Commands::ImportAi {
            file,
            kind,
            settings,
        } => {
            import::import_ai(&file, kind, settings).await?;
        }
        Commands::Settings { path, command } => {
            settings::run(path, command)?;
        }
    }

    Ok(())
}
