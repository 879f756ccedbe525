//! Entry point for importing a recipe from any source.
//!
//! AI sources go through the provider chain, text sources through the
//! heuristic extractor. Both end in the scorer, so callers always get an
//! [`ImportResult`] with the same confidence semantics.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::ai::{
    build_recipe_extract_request, AiErrorType, AiResponse, ImportConfig, ImportOrchestrator,
    ImportRun, ProviderClientFactory, ResponseClassifier,
};
use crate::error::ImportError;
use crate::ingredient_classifier::classify;
use crate::scoring::FieldExtractionScorer;
use crate::settings::ImportSettings;
use crate::text_extract;
use crate::types::{ExtractedFields, ImportResult, IngredientRole, RecipeKind, ScoredField};

/// Confidence for a field the vendor filled in without rating it.
const UNRATED_FIELD_CONFIDENCE: f64 = 0.6;

/// Confidence for seasonings picked out of the ingredient list by role.
const DERIVED_SEASONING_CONFIDENCE: f64 = 0.6;

/// Where a recipe comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    /// Text to send to an AI provider for extraction.
    Ai {
        kind: RecipeKind,
        source_text: String,
    },
    /// Text scraped from `source` (a URL or "ocr"), parsed locally.
    Text {
        kind: RecipeKind,
        source: String,
        text: String,
    },
}

impl SourcePayload {
    pub fn kind(&self) -> RecipeKind {
        match self {
            SourcePayload::Ai { kind, .. } | SourcePayload::Text { kind, .. } => *kind,
        }
    }
}

/// Imports recipes and scores them.
pub struct Importer {
    orchestrator: ImportOrchestrator,
    scorer: FieldExtractionScorer,
}

impl Importer {
    pub fn new(orchestrator: ImportOrchestrator, scorer: FieldExtractionScorer) -> Self {
        Self {
            orchestrator,
            scorer,
        }
    }

    /// An importer calling the real vendor APIs, with the default weight tables.
    pub fn from_config(config: ImportConfig) -> Self {
        Self::new(
            ImportOrchestrator::from_config(config).with_payload_check(check_recipe_payload),
            FieldExtractionScorer::new(),
        )
    }

    /// An importer using `factory` for provider clients.
    pub fn with_factory(factory: Arc<dyn ProviderClientFactory>) -> Self {
        Self::new(
            ImportOrchestrator::new(factory, ResponseClassifier::default())
                .with_payload_check(check_recipe_payload),
            FieldExtractionScorer::new(),
        )
    }

    pub fn scorer_mut(&mut self) -> &mut FieldExtractionScorer {
        &mut self.scorer
    }

    /// Import one recipe.
    ///
    /// `settings` is a snapshot; changes saved while the import runs do not
    /// affect it. Cancelling `cancel` stops an AI import at once.
    pub async fn import_from(
        &self,
        settings: &ImportSettings,
        payload: SourcePayload,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, ImportError> {
        match payload {
            SourcePayload::Ai { kind, source_text } => {
                self.import_ai(settings, kind, &source_text, cancel).await
            }
            SourcePayload::Text { kind, source, text } => self.import_text(kind, source, &text),
        }
    }

    fn import_text(
        &self,
        kind: RecipeKind,
        source: String,
        text: &str,
    ) -> Result<ImportResult, ImportError> {
        if text.trim().is_empty() {
            return Err(ImportError::EmptySource);
        }
        let extraction = text_extract::extract(kind, text);
        Ok(self
            .scorer
            .score(kind, extraction.fields, &extraction.confidence, source)?)
    }

    async fn import_ai(
        &self,
        settings: &ImportSettings,
        kind: RecipeKind,
        source_text: &str,
        cancel: &CancellationToken,
    ) -> Result<ImportResult, ImportError> {
        if source_text.trim().is_empty() {
            return Err(ImportError::EmptySource);
        }

        let request = build_recipe_extract_request(kind, source_text);
        let run = self.orchestrator.import_from(settings, &request, cancel).await;
        log_attempts(&run);

        let ImportRun {
            response, provider, ..
        } = run;

        let data = match response {
            AiResponse::Success { data } => data,
            AiResponse::Error {
                message,
                error_type,
                raw_error,
            } => {
                return Err(ImportError::Ai {
                    message,
                    error_type,
                    raw_error,
                })
            }
        };

        let (fields, confidence) = fields_from_ai(kind, data).map_err(|e| ImportError::Ai {
            message: AiErrorType::MalformedResponse.default_message().to_string(),
            error_type: AiErrorType::MalformedResponse,
            raw_error: Some(e.to_string()),
        })?;

        let source = provider
            .map(|p| p.source_id())
            .unwrap_or_else(|| "ai".to_string());
        Ok(self.scorer.score(kind, fields, &confidence, source)?)
    }
}

fn log_attempts(run: &ImportRun) {
    for attempt in &run.attempts {
        tracing::debug!(
            provider = %attempt.provider,
            network_call = attempt.network_call,
            success = attempt.success,
            error_type = ?attempt.error_type,
            cancelled = attempt.cancelled,
            duration_ms = attempt.duration_ms,
            "Provider attempt"
        );
    }
}

/// The JSON object the extraction prompt asks vendors to return.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiRecipePayload {
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    serves: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    temperature: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    wood: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    seasonings: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    directions: Vec<String>,
    #[serde(default)]
    confidence: Option<HashMap<String, Option<f64>>>,
}

/// Rejects model output that does not deserialize as [`AiRecipePayload`].
///
/// Runs inside the response classifier, so a wrong-shaped object counts as
/// `malformedResponse` and the next provider is tried.
fn check_recipe_payload(data: &Map<String, JsonValue>) -> Result<(), String> {
    serde_json::from_value::<AiRecipePayload>(JsonValue::Object(data.clone()))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// A string or number; blank strings and null become `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a string, got {}",
            other
        ))),
    }
}

/// An array of strings, or one newline-separated string.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::String(s)) => s.lines().map(str::to_string).collect(),
        Some(JsonValue::Array(values)) => values
            .into_iter()
            .map(|v| match v {
                JsonValue::String(s) => Ok(s),
                JsonValue::Number(n) => Ok(n.to_string()),
                other => Err(de::Error::custom(format!(
                    "expected a list of strings, got item {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(de::Error::custom(format!(
                "expected a list of strings, got {}",
                other
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Turn a successful AI payload into fields plus confidences.
///
/// Only fields that carry a value get a confidence; a vendor claiming to be
/// sure about an empty field does not raise the score.
fn fields_from_ai(
    kind: RecipeKind,
    data: Map<String, JsonValue>,
) -> Result<(ExtractedFields, HashMap<ScoredField, f64>), serde_json::Error> {
    let payload: AiRecipePayload = serde_json::from_value(JsonValue::Object(data))?;

    let rated: HashMap<ScoredField, f64> = payload
        .confidence
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| Some((ScoredField::from_name(&key)?, value?)))
        .collect();

    let mut fields = ExtractedFields {
        name: payload.name,
        serves: payload.serves,
        temperature: payload.temperature,
        time: payload.time,
        wood: payload.wood,
        notes: payload.notes,
        image_url: payload.image_url,
        ingredients: payload.ingredients,
        seasonings: payload.seasonings,
        directions: payload.directions,
        ..Default::default()
    };

    fields.raw_ingredients = fields
        .ingredients
        .iter()
        .chain(fields.seasonings.iter())
        .map(|line| classify(line))
        .collect();

    let mut confidence: HashMap<ScoredField, f64> = ScoredField::ALL
        .iter()
        .copied()
        .filter(|&field| has_value(&fields, field))
        .map(|field| {
            let value = rated
                .get(&field)
                .copied()
                .unwrap_or(UNRATED_FIELD_CONFIDENCE);
            (field, value)
        })
        .collect();

    if kind == RecipeKind::Smoking && fields.seasonings.is_empty() {
        let derived: Vec<String> = fields
            .raw_ingredients
            .iter()
            .filter(|line| line.role == IngredientRole::Seasoning)
            .map(|line| line.original.clone())
            .collect();
        if !derived.is_empty() {
            fields.seasonings = derived;
            confidence.insert(ScoredField::Seasonings, DERIVED_SEASONING_CONFIDENCE);
        }
    }

    Ok((fields, confidence))
}

fn has_value(fields: &ExtractedFields, field: ScoredField) -> bool {
    fn present(value: &Option<String>) -> bool {
        value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }

    match field {
        ScoredField::Name => present(&fields.name),
        ScoredField::Serves => present(&fields.serves),
        ScoredField::Temperature => present(&fields.temperature),
        ScoredField::Time => present(&fields.time),
        ScoredField::Wood => present(&fields.wood),
        ScoredField::Ingredients => !fields.ingredients.is_empty(),
        ScoredField::Seasonings => !fields.seasonings.is_empty(),
        ScoredField::Directions => !fields.directions.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FakeProviderFactory;
    use crate::settings::{ProviderConfig, ProviderId};

    const SMOKED_BRISKET: &str = r#"{
        "name": "Smoked Brisket",
        "temperature": "225°F",
        "time": 12,
        "wood": "post oak",
        "seasonings": ["2 tablespoons kosher salt", "2 tablespoons black pepper"],
        "directions": ["Trim the brisket.", "Smoke until tender."],
        "confidence": {
            "name": 0.9, "temperature": 0.9, "time": 0.9,
            "wood": 0.9, "seasonings": 0.9, "directions": 0.9
        }
    }"#;

    fn claude_settings() -> ImportSettings {
        ImportSettings::new(Some(ProviderId::Claude), false)
            .with_provider(ProviderConfig::enabled_with_key(ProviderId::Claude, "sk-ant"))
    }

    fn ai(kind: RecipeKind, text: &str) -> SourcePayload {
        SourcePayload::Ai {
            kind,
            source_text: text.to_string(),
        }
    }

    fn importer(factory: FakeProviderFactory) -> Importer {
        Importer::with_factory(Arc::new(factory))
    }

    #[tokio::test]
    async fn test_ai_import_scores_vendor_confidences() {
        let importer = importer(
            FakeProviderFactory::new().with_model_text(ProviderId::Claude, SMOKED_BRISKET),
        );

        let result = importer
            .import_from(
                &claude_settings(),
                ai(RecipeKind::Smoking, "brisket text"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.source(), "ai:claude");
        assert!((result.overall_confidence() - 0.9).abs() < 1e-9);
        assert!(result.can_auto_save());
        assert_eq!(result.fields().time.as_deref(), Some("12"));
        assert_eq!(result.fields().raw_ingredients.len(), 2);
        assert_eq!(
            result.fields().raw_ingredients[0].amount.as_deref(),
            Some("2 Tbsp")
        );
    }

    #[tokio::test]
    async fn test_ai_import_without_provider_is_no_token() {
        let importer = importer(FakeProviderFactory::new());

        let err = importer
            .import_from(
                &ImportSettings::default(),
                ai(RecipeKind::Standard, "pancakes"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.error_type(), Some(AiErrorType::NoToken));
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_malformed() {
        let importer = importer(FakeProviderFactory::new().with_model_text(
            ProviderId::Claude,
            r#"{"name": "Ribs", "directions": {"step": "smoke"}}"#,
        ));

        let err = importer
            .import_from(
                &claude_settings(),
                ai(RecipeKind::Smoking, "ribs"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            ImportError::Ai {
                error_type,
                raw_error,
                ..
            } => {
                assert_eq!(error_type, AiErrorType::MalformedResponse);
                assert!(raw_error.is_some_and(|r| r.contains("step")));
            }
            other => panic!("expected AI error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_shape_falls_back_to_next_provider() {
        let factory = FakeProviderFactory::new()
            .with_model_text(
                ProviderId::OpenAi,
                r#"{"name": "Ribs", "directions": {"step": "smoke"}}"#,
            )
            .with_model_text(ProviderId::Claude, SMOKED_BRISKET);
        let importer = importer(factory.clone());
        let settings = ImportSettings::new(Some(ProviderId::OpenAi), true)
            .with_provider(ProviderConfig::enabled_with_key(ProviderId::OpenAi, "sk-openai"))
            .with_provider(ProviderConfig::enabled_with_key(ProviderId::Claude, "sk-ant"));

        let result = importer
            .import_from(
                &settings,
                ai(RecipeKind::Smoking, "ribs"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(factory.calls(), vec![ProviderId::OpenAi, ProviderId::Claude]);
        assert_eq!(result.source(), "ai:claude");
        assert_eq!(result.fields().name.as_deref(), Some("Smoked Brisket"));
    }

    #[test]
    fn test_check_recipe_payload() {
        let object = |json: &str| match serde_json::from_str::<JsonValue>(json).unwrap() {
            JsonValue::Object(map) => map,
            other => panic!("not an object: {}", other),
        };

        assert!(check_recipe_payload(&object(SMOKED_BRISKET)).is_ok());
        assert!(check_recipe_payload(&object(r#"{"name": "Ribs", "time": 6}"#)).is_ok());
        assert!(check_recipe_payload(&object(r#"{"name": ["Ribs"]}"#)).is_err());
        assert!(
            check_recipe_payload(&object(r#"{"name": "Ribs", "confidence": {"name": "high"}}"#))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unrated_and_empty_fields() {
        let importer = importer(FakeProviderFactory::new().with_model_text(
            ProviderId::Claude,
            r#"{
                "name": "Pancakes",
                "serves": "",
                "ingredients": "2 cups flour\n2 eggs",
                "directions": ["Mix.", "Cook."],
                "confidence": {"name": 1.0, "serves": 1.0, "time": null, "garnish": 1.0}
            }"#,
        ));

        let result = importer
            .import_from(
                &claude_settings(),
                ai(RecipeKind::Standard, "pancakes"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.field_confidence(ScoredField::Name), Some(1.0));
        assert_eq!(result.field_confidence(ScoredField::Serves), Some(0.0));
        assert_eq!(
            result.field_confidence(ScoredField::Ingredients),
            Some(UNRATED_FIELD_CONFIDENCE)
        );
        assert_eq!(result.fields().ingredients, vec!["2 cups flour", "2 eggs"]);
        // 0.2 * 1.0 + 0.3 * 0.6 + 0.3 * 0.6
        assert!((result.overall_confidence() - 0.56).abs() < 1e-9);
        assert!(result.needs_user_review());
        assert_eq!(
            result.fields_needing_attention(),
            &[ScoredField::Serves, ScoredField::Time]
        );
    }

    #[tokio::test]
    async fn test_smoking_seasonings_derived_from_ingredients() {
        let importer = importer(FakeProviderFactory::new().with_model_text(
            ProviderId::Claude,
            r#"{
                "name": "Pork Butt",
                "ingredients": ["1 pork butt", "2 tbsp smoked paprika"],
                "directions": ["Smoke."]
            }"#,
        ));

        let result = importer
            .import_from(
                &claude_settings(),
                ai(RecipeKind::Smoking, "pork"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.fields().seasonings, vec!["2 tbsp smoked paprika"]);
        assert_eq!(
            result.field_confidence(ScoredField::Seasonings),
            Some(DERIVED_SEASONING_CONFIDENCE)
        );
    }

    #[tokio::test]
    async fn test_text_import() {
        let factory = FakeProviderFactory::new();
        let importer = importer(factory.clone());
        let text = "Smoked Wings\nTemperature: 250°F\nWood: hickory\n\nIngredients\n2 lbs chicken wings\n1 tbsp salt\n\nDirections\nSmoke for 2 hours.\n";

        let result = importer
            .import_from(
                &ImportSettings::default(),
                SourcePayload::Text {
                    kind: RecipeKind::Smoking,
                    source: "ocr".to_string(),
                    text: text.to_string(),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.source(), "ocr");
        assert_eq!(result.kind(), RecipeKind::Smoking);
        assert_eq!(result.fields().name.as_deref(), Some("Smoked Wings"));
        assert_eq!(result.fields().seasonings, vec!["1 Tbsp Salt"]);
        assert!(result.has_minimum_data());
        assert!(factory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let importer = importer(FakeProviderFactory::new());
        let err = importer
            .import_from(
                &claude_settings(),
                ai(RecipeKind::Standard, "   "),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::EmptySource));
    }

    #[tokio::test]
    async fn test_cancelled_import() {
        let importer = importer(FakeProviderFactory::new().with_model_text(
            ProviderId::Claude,
            SMOKED_BRISKET,
        ));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = importer
            .import_from(&claude_settings(), ai(RecipeKind::Smoking, "x"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), Some(AiErrorType::Unknown));
        assert_eq!(err.to_string(), "Import cancelled");
    }
}
