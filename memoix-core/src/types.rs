use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownRecipeKind;

/// Kind of recipe being imported. Each kind scores a different set of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    Standard,
    Smoking,
}

impl RecipeKind {
    pub const ALL: &'static [RecipeKind] = &[RecipeKind::Standard, RecipeKind::Smoking];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeKind::Standard => "standard",
            RecipeKind::Smoking => "smoking",
        }
    }
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeKind {
    type Err = UnknownRecipeKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(RecipeKind::Standard),
            "smoking" => Ok(RecipeKind::Smoking),
            _ => Err(UnknownRecipeKind(s.to_string())),
        }
    }
}

/// A field that carries a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredField {
    Name,
    Serves,
    Temperature,
    Time,
    Wood,
    Ingredients,
    Seasonings,
    Directions,
}

impl ScoredField {
    pub const ALL: &'static [ScoredField] = &[
        ScoredField::Name,
        ScoredField::Serves,
        ScoredField::Temperature,
        ScoredField::Time,
        ScoredField::Wood,
        ScoredField::Ingredients,
        ScoredField::Seasonings,
        ScoredField::Directions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoredField::Name => "name",
            ScoredField::Serves => "serves",
            ScoredField::Temperature => "temperature",
            ScoredField::Time => "time",
            ScoredField::Wood => "wood",
            ScoredField::Ingredients => "ingredients",
            ScoredField::Seasonings => "seasonings",
            ScoredField::Directions => "directions",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        ScoredField::ALL.iter().copied().find(|f| f.as_str() == s)
    }
}

/// Semantic role of an ingredient line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngredientRole {
    Seasoning,
    MainProtein,
    Liquid,
    Unclassified,
}

/// One ingredient line after heuristic classification.
///
/// Never treated as ground truth; the role stays user-correctable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIngredientLine {
    pub original: String,
    pub amount: Option<String>,
    pub name: String,
    pub role: IngredientRole,
    /// Trailing preparation note, e.g. "diced" or "to taste".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation: Option<String>,
    /// Substitute named with "alt:", e.g. "honey".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<String>,
    #[serde(default)]
    pub is_optional: bool,
}

impl RawIngredientLine {
    /// The line rebuilt for display, e.g. "1 Yellow Onion, diced (optional)".
    pub fn display(&self) -> String {
        let mut out = match &self.amount {
            Some(amount) => format!("{} {}", amount, self.name),
            None => self.name.clone(),
        };
        if let Some(preparation) = &self.preparation {
            out.push_str(", ");
            out.push_str(preparation);
        }
        if let Some(alternative) = &self.alternative {
            out.push_str(&format!(" (alt: {})", alternative));
        }
        if self.is_optional {
            out.push_str(" (optional)");
        }
        out
    }
}

/// Recipe fields pulled out of a source, before scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub serves: Option<String>,
    pub temperature: Option<String>,
    pub time: Option<String>,
    pub wood: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
    pub seasonings: Vec<String>,
    pub directions: Vec<String>,
    /// Classified ingredient lines, kept for user correction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_ingredients: Vec<RawIngredientLine>,
    /// Every value detected for an ambiguous field, for the user to pick from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub candidates: BTreeMap<ScoredField, Vec<String>>,
}

impl ExtractedFields {
    /// A name and at least one direction: the least a recipe can be saved with.
    pub fn has_minimum_data(&self) -> bool {
        let has_name = self
            .name
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false);
        let has_directions = self.directions.iter().any(|d| !d.trim().is_empty());
        has_name && has_directions
    }
}

/// A scored import candidate, ready to be saved or sent to review.
///
/// Only the scorer builds these; there are no mutating methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub(crate) kind: RecipeKind,
    pub(crate) fields: ExtractedFields,
    pub(crate) confidence: BTreeMap<ScoredField, f64>,
    pub(crate) overall_confidence: f64,
    pub(crate) needs_user_review: bool,
    pub(crate) has_minimum_data: bool,
    pub(crate) fields_needing_attention: Vec<ScoredField>,
    pub(crate) source: String,
}

impl ImportResult {
    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    pub fn fields(&self) -> &ExtractedFields {
        &self.fields
    }

    pub fn into_fields(self) -> ExtractedFields {
        self.fields
    }

    /// Clamped confidence per scored field.
    pub fn confidence(&self) -> &BTreeMap<ScoredField, f64> {
        &self.confidence
    }

    pub fn field_confidence(&self, field: ScoredField) -> Option<f64> {
        self.confidence.get(&field).copied()
    }

    pub fn overall_confidence(&self) -> f64 {
        self.overall_confidence
    }

    pub fn needs_user_review(&self) -> bool {
        self.needs_user_review
    }

    pub fn has_minimum_data(&self) -> bool {
        self.has_minimum_data
    }

    pub fn fields_needing_attention(&self) -> &[ScoredField] {
        &self.fields_needing_attention
    }

    /// Where the recipe came from: a URL, "ocr", or "ai:<provider>".
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Confident and complete enough to save without asking the user.
    pub fn can_auto_save(&self) -> bool {
        !self.needs_user_review && self.has_minimum_data
    }
}
