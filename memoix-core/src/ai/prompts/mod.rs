//! AI prompt templates.

pub mod recipe_extract;

pub use recipe_extract::{
    build_recipe_extract_request, render_recipe_extract_prompt, RECIPE_EXTRACT_PROMPT_NAME,
};
