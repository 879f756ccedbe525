pub mod ai;
pub mod error;
pub mod importer;
pub mod ingredient_classifier;
pub mod scoring;
pub mod settings;
pub mod text_extract;
pub mod types;

pub use error::{ImportError, ScoringError, UnknownRecipeKind};
pub use importer::{Importer, SourcePayload};
pub use ingredient_classifier::{classify, classify_lines, normalize_unit, normalize_units};
pub use scoring::{FieldExtractionScorer, WeightTable, REVIEW_THRESHOLD};
pub use settings::{
    default_settings_path, ImportSettings, InMemorySettingsGateway, JsonFileSettingsGateway,
    ProviderConfig, ProviderId, SettingsError, SettingsGateway,
};
pub use types::{
    ExtractedFields, ImportResult, IngredientRole, RawIngredientLine, RecipeKind, ScoredField,
};
