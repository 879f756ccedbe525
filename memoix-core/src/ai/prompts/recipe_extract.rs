//! Prompt template for extracting a recipe from pasted or scraped text.

use crate::ai::types::{ChatMessage, ProviderRequest};
use crate::types::RecipeKind;

pub const RECIPE_EXTRACT_PROMPT_NAME: &str = "recipe_extract";

const MAX_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.1;

/// Render the system prompt for `kind`.
pub fn render_recipe_extract_prompt(kind: RecipeKind) -> String {
    let (kind_fields, confidence_keys) = match kind {
        RecipeKind::Standard => (
            r#"  "serves": "Number of servings if present (null if not present)",
  "time": "Total time if present (null if not present)","#,
            "name, serves, time, ingredients, directions",
        ),
        RecipeKind::Smoking => (
            r#"  "temperature": "Smoker temperature with unit, e.g. 225°F (null if not present)",
  "time": "Total smoke time if present (null if not present)",
  "wood": "Wood type used for smoke, e.g. hickory (null if not present)",
  "seasonings": ["Each rub or seasoning ingredient, exactly as written"],"#,
            "name, temperature, time, wood, seasonings, directions",
        ),
    };

    format!(
        r#"You are a recipe extraction assistant for {kind} recipes. You are given the text of a recipe copied from a web page or read from a photo.

Extract the recipe and return it as JSON with this exact structure:
{{
  "name": "Recipe Name",
{kind_fields}
  "ingredients": ["Each ingredient on its own entry, exactly as written"],
  "directions": ["Each step as its own entry, without step numbers"],
  "notes": "Any notes, tips, or variations mentioned (null if not present)",
  "imageUrl": "Image URL if one appears in the text (null if not present)",
  "confidence": {{"name": 0.0}}
}}

Rules:
- Extract the text EXACTLY as written in the recipe - do not paraphrase or invent
- If information is not present in the text, use null or an empty list
- "confidence" maps each of these fields to a number from 0.0 to 1.0 saying how sure you are the value is correct: {confidence_keys}
- Return ONLY the JSON, no other text"#,
        kind = kind,
        kind_fields = kind_fields,
        confidence_keys = confidence_keys,
    )
}

/// Build the full request for extracting a recipe of `kind` from `source_text`.
pub fn build_recipe_extract_request(kind: RecipeKind, source_text: &str) -> ProviderRequest {
    ProviderRequest {
        messages: vec![
            ChatMessage::system(render_recipe_extract_prompt(kind)),
            ChatMessage::user(source_text),
        ],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}
