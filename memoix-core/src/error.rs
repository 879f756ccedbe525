use thiserror::Error;

use crate::ai::AiErrorType;
use crate::types::{RecipeKind, ScoredField};

#[derive(Error, Debug)]
#[error("Unknown recipe kind: {0}")]
pub struct UnknownRecipeKind(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Weight table is empty")]
    EmptyTable,

    #[error("Field {0:?} appears more than once in weight table")]
    DuplicateField(ScoredField),

    #[error("Weight for {field:?} must be a finite non-negative number, got {weight}")]
    InvalidWeight { field: ScoredField, weight: f64 },

    #[error("Weights must sum to 1.0, got {0}")]
    WeightsDoNotSumToOne(f64),

    #[error("No weight table registered for recipe kind {0}")]
    UnregisteredKind(RecipeKind),
}

#[derive(Error, Debug)]
pub enum ImportError {
    /// The AI chain ended without a success.
    #[error("{message}")]
    Ai {
        message: String,
        error_type: AiErrorType,
        raw_error: Option<String>,
    },

    #[error("Source text is empty")]
    EmptySource,

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl ImportError {
    pub fn error_type(&self) -> Option<AiErrorType> {
        match self {
            ImportError::Ai { error_type, .. } => Some(*error_type),
            _ => None,
        }
    }
}
