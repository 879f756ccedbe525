//! Field extraction scoring.
//!
//! Combines per-field confidences into one weighted overall confidence and
//! decides whether an import can be saved as-is or needs the user to review it.
//! Each recipe kind has its own weight table.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ScoringError;
use crate::types::{ExtractedFields, ImportResult, RecipeKind, ScoredField};

/// Overall confidence below this sends the import to review.
pub const REVIEW_THRESHOLD: f64 = 0.7;

/// Field confidence below this flags the field for attention.
pub const ATTENTION_THRESHOLD: f64 = 0.5;

/// Tolerance for floating point sums.
const EPSILON: f64 = 1e-9;

/// Per-field weights for one recipe kind. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    entries: Vec<(ScoredField, f64)>,
}

impl WeightTable {
    pub fn new(entries: Vec<(ScoredField, f64)>) -> Result<Self, ScoringError> {
        if entries.is_empty() {
            return Err(ScoringError::EmptyTable);
        }

        let mut seen = HashSet::new();
        for &(field, weight) in &entries {
            if !seen.insert(field) {
                return Err(ScoringError::DuplicateField(field));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::InvalidWeight { field, weight });
            }
        }

        let sum: f64 = entries.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > EPSILON {
            return Err(ScoringError::WeightsDoNotSumToOne(sum));
        }

        Ok(Self { entries })
    }

    /// Name 15%, temperature 20%, time 15%, wood 15%, seasonings 15%,
    /// directions 20%.
    pub fn smoking() -> Self {
        Self {
            entries: vec![
                (ScoredField::Name, 0.15),
                (ScoredField::Temperature, 0.20),
                (ScoredField::Time, 0.15),
                (ScoredField::Wood, 0.15),
                (ScoredField::Seasonings, 0.15),
                (ScoredField::Directions, 0.20),
            ],
        }
    }

    /// Name 20%, serves 10%, time 10%, ingredients 30%, directions 30%.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                (ScoredField::Name, 0.20),
                (ScoredField::Serves, 0.10),
                (ScoredField::Time, 0.10),
                (ScoredField::Ingredients, 0.30),
                (ScoredField::Directions, 0.30),
            ],
        }
    }

    pub fn entries(&self) -> &[(ScoredField, f64)] {
        &self.entries
    }

    pub fn fields(&self) -> impl Iterator<Item = ScoredField> + '_ {
        self.entries.iter().map(|(field, _)| *field)
    }

    pub fn weight(&self, field: ScoredField) -> Option<f64> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, w)| *w)
    }
}

/// Scores extracted fields against the weight table for their recipe kind.
#[derive(Debug, Clone)]
pub struct FieldExtractionScorer {
    tables: HashMap<RecipeKind, WeightTable>,
}

impl Default for FieldExtractionScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractionScorer {
    /// A scorer with the built-in tables for every [`RecipeKind`].
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(RecipeKind::Standard, WeightTable::standard());
        tables.insert(RecipeKind::Smoking, WeightTable::smoking());
        Self { tables }
    }

    /// Replace the table for `kind`, returning the previous one.
    pub fn register(&mut self, kind: RecipeKind, table: WeightTable) -> Option<WeightTable> {
        self.tables.insert(kind, table)
    }

    pub fn table(&self, kind: RecipeKind) -> Option<&WeightTable> {
        self.tables.get(&kind)
    }

    /// Score one import candidate.
    ///
    /// Confidences are clamped to `[0, 1]`; missing or NaN confidences count
    /// as zero.
    pub fn score(
        &self,
        kind: RecipeKind,
        fields: ExtractedFields,
        confidences: &HashMap<ScoredField, f64>,
        source: impl Into<String>,
    ) -> Result<ImportResult, ScoringError> {
        let table = self
            .tables
            .get(&kind)
            .ok_or(ScoringError::UnregisteredKind(kind))?;

        let mut confidence = BTreeMap::new();
        let mut overall = 0.0;
        let mut fields_needing_attention = Vec::new();

        for &(field, weight) in table.entries() {
            let value = clamp_unit(confidences.get(&field).copied().unwrap_or(0.0));
            overall += weight * value;
            if value < ATTENTION_THRESHOLD {
                fields_needing_attention.push(field);
            }
            confidence.insert(field, value);
        }

        let overall_confidence = clamp_unit(overall);
        // Absorb rounding so a score of exactly the threshold is not reviewed.
        let needs_user_review = overall_confidence < REVIEW_THRESHOLD - EPSILON;
        let has_minimum_data = fields.has_minimum_data();
        let source = source.into();

        tracing::debug!(
            kind = %kind,
            source = %source,
            overall_confidence,
            needs_user_review,
            has_minimum_data,
            attention = fields_needing_attention.len(),
            "Scored import"
        );

        Ok(ImportResult {
            kind,
            fields,
            confidence,
            overall_confidence,
            needs_user_review,
            has_minimum_data,
            fields_needing_attention,
            source,
        })
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
