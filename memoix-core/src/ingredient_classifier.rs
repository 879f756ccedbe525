//! Ingredient line classification.
//!
//! Splits a free-text ingredient line (e.g. "2 tablespoons kosher salt") into an
//! amount and a name, normalizes the unit, and guesses the ingredient's role in
//! the recipe. Trailing notes ("(optional)", "alt: honey", ", diced") are
//! pulled off before the name is matched. Role keywords are loaded from `data/ingredient_roles.json` at
//! compile time.
//!
//! The result is a best-effort guess. Callers keep it user-correctable.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::{IngredientRole, RawIngredientLine};

/// Unit spellings and their canonical form. Every canonical form also appears
/// as a key mapping to itself, so normalization is idempotent.
const UNIT_ALIASES: &[(&str, &str)] = &[
    ("tablespoons", "Tbsp"),
    ("tablespoon", "Tbsp"),
    ("tables", "Tbsp"),
    ("tbsps", "Tbsp"),
    ("tbsp", "Tbsp"),
    ("tbs", "Tbsp"),
    ("tbl", "Tbsp"),
    ("teaspoons", "tsp"),
    ("teaspoon", "tsp"),
    ("tsps", "tsp"),
    ("tsp", "tsp"),
    ("cups", "cup"),
    ("cup", "cup"),
    ("c", "cup"),
    ("pounds", "lb"),
    ("pound", "lb"),
    ("lbs", "lb"),
    ("lb", "lb"),
    ("ounces", "oz"),
    ("ounce", "oz"),
    ("ozes", "oz"),
    ("oz", "oz"),
    ("grams", "g"),
    ("gram", "g"),
    ("gr", "g"),
    ("g", "g"),
    ("kilograms", "kg"),
    ("kilogram", "kg"),
    ("kilos", "kg"),
    ("kgs", "kg"),
    ("kg", "kg"),
    ("milliliters", "ml"),
    ("millilitres", "ml"),
    ("milliliter", "ml"),
    ("millilitre", "ml"),
    ("ml", "ml"),
    ("liters", "l"),
    ("litres", "l"),
    ("liter", "l"),
    ("litre", "l"),
    ("l", "l"),
    ("quarts", "qt"),
    ("quart", "qt"),
    ("qt", "qt"),
    ("pints", "pt"),
    ("pint", "pt"),
    ("pt", "pt"),
    ("gallons", "gal"),
    ("gallon", "gal"),
    ("gal", "gal"),
    ("cloves", "cloves"),
    ("clove", "clove"),
    ("pinches", "pinches"),
    ("pinch", "pinch"),
    ("dashes", "dashes"),
    ("dash", "dash"),
    ("cans", "cans"),
    ("can", "can"),
    ("slices", "slices"),
    ("slice", "slice"),
    ("sprigs", "sprigs"),
    ("sprig", "sprig"),
    ("stalks", "stalks"),
    ("stalk", "stalk"),
    ("bunches", "bunches"),
    ("bunch", "bunch"),
    ("heads", "heads"),
    ("head", "head"),
];

static UNITS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| UNIT_ALIASES.iter().copied().collect());

/// A leading quantity: mixed numbers, vulgar fractions, ASCII fractions,
/// decimals and integers, optionally as a range ("2-3", "2 to 3").
static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let number = r"(?:\d+\s+\d+/\d+|\d+\s*[½¼¾⅓⅔⅛⅜⅝⅞]|\d+/\d+|\d*\.\d+|\d+|[½¼¾⅓⅔⅛⅜⅝⅞])";
    Regex::new(&format!(
        r"^({n}(?:\s*(?:-|–|to)\s*{n})?)\s*(.*)$",
        n = number
    ))
    .expect("quantity pattern is valid")
});

static OPTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\(\s*optional\s*\)|,?\s*\boptional\b").expect("optional pattern is valid")
});

static ALTERNATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i),?\s*\(?\s*\balt:\s*([^,)]+)\)?").expect("alternative pattern is valid")
});

static PREPARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i),\s*((?:diced|minced|cubed|chopped|sliced|grated|crushed|melted|softened|room temp(?:erature)?|cold|warm|hot|to taste|beaten|whisked)\b.*)$",
    )
    .expect("preparation pattern is valid")
});

#[derive(Deserialize)]
struct RoleKeywords {
    main_protein: Vec<String>,
    liquid: Vec<String>,
    seasoning: Vec<String>,
}

/// Role matchers in priority order. The first match wins.
static ROLE_MATCHERS: LazyLock<Vec<(IngredientRole, Regex)>> = LazyLock::new(|| {
    let json = include_str!("../data/ingredient_roles.json");
    let data: RoleKeywords =
        serde_json::from_str(json).expect("Failed to parse ingredient_roles.json");

    vec![
        (IngredientRole::MainProtein, keyword_regex(data.main_protein)),
        (IngredientRole::Liquid, keyword_regex(data.liquid)),
        (IngredientRole::Seasoning, keyword_regex(data.seasoning)),
    ]
});

/// Whole-word match of any keyword, allowing a plural suffix.
fn keyword_regex(mut keywords: Vec<String>) -> Regex {
    // Longest first so multi-word keywords win over their prefixes.
    keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})(?:e?s)?\b", alternation)).expect("keyword pattern is valid")
}

/// Canonical form of a single unit token, if it is a known unit.
///
/// Case-insensitive except for the single letters "t" (teaspoon) and "T"
/// (tablespoon); a trailing period is ignored ("oz." is "oz").
pub fn normalize_unit(token: &str) -> Option<&'static str> {
    let token = token.trim().trim_end_matches('.');
    match token {
        "t" => return Some("tsp"),
        "T" => return Some("Tbsp"),
        _ => {}
    }
    UNITS.get(token.to_lowercase().as_str()).copied()
}

/// Replace every unit token in `text` with its canonical form.
///
/// Tokens that are not units pass through unchanged. Applying this twice gives
/// the same result as applying it once.
pub fn normalize_units(text: &str) -> String {
    text.split_whitespace()
        .map(|token| normalize_unit(token).unwrap_or(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize the first letter of each word and lowercase the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Guess the role of an ingredient from its name.
pub fn role_for(name: &str) -> IngredientRole {
    let lower = name.to_lowercase();
    ROLE_MATCHERS
        .iter()
        .find(|(_, re)| re.is_match(&lower))
        .map(|(role, _)| *role)
        .unwrap_or(IngredientRole::Unclassified)
}

/// Classify one ingredient line.
pub fn classify(raw_line: &str) -> RawIngredientLine {
    let original = raw_line.trim().to_string();
    let (text, notes) = strip_annotations(strip_bullet(&original));
    let (amount, name) = split_amount(&text);

    RawIngredientLine {
        role: role_for(name),
        name: title_case(name),
        amount,
        preparation: notes.preparation,
        alternative: notes.alternative,
        is_optional: notes.is_optional,
        original,
    }
}

/// Classify every non-blank line of `text`.
pub fn classify_lines(text: &str) -> Vec<RawIngredientLine> {
    text.lines()
        .filter(|line| !strip_bullet(line.trim()).is_empty())
        .map(classify)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(['-', '*', '•', '·']).trim_start()
}

#[derive(Debug, Default, PartialEq)]
struct Annotations {
    preparation: Option<String>,
    alternative: Option<String>,
    is_optional: bool,
}

/// Remove the optional marker, an "alt:" substitute and a trailing
/// preparation note, in that order.
///
/// A line that would be left empty is returned unchanged.
fn strip_annotations(line: &str) -> (String, Annotations) {
    let mut notes = Annotations::default();

    let text = if OPTIONAL_RE.is_match(line) {
        notes.is_optional = true;
        OPTIONAL_RE.replace_all(line, "").trim().to_string()
    } else {
        line.to_string()
    };

    let alternative = ALTERNATIVE_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());
    let text = match alternative {
        Some(alternative) => {
            notes.alternative = Some(alternative);
            ALTERNATIVE_RE.replace(&text, "").trim().to_string()
        }
        None => text,
    };

    let preparation = PREPARATION_RE.captures(&text).and_then(|caps| {
        let start = caps.get(0)?.start();
        Some((start, caps.get(1)?.as_str().trim().to_string()))
    });
    let text = match preparation {
        Some((start, note)) => {
            notes.preparation = Some(note);
            text[..start].trim().to_string()
        }
        None => text,
    };

    if text.is_empty() {
        return (line.to_string(), Annotations::default());
    }
    (text, notes)
}

/// Split a line into an optional amount (quantity plus unit) and the name.
fn split_amount(line: &str) -> (Option<String>, &str) {
    let Some(caps) = QUANTITY_RE.captures(line) else {
        return (None, line);
    };
    let (Some(quantity), Some(rest)) = (caps.get(1), caps.get(2)) else {
        return (None, line);
    };

    // "500g" is a quantity glued to a unit; "12-inch" is not a quantity at all.
    let glued = rest.start() == quantity.end() && !rest.as_str().is_empty();

    let quantity = quantity.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
    let rest = rest.as_str().trim();

    let (token, after_token) = match rest.find(char::is_whitespace) {
        Some(i) => (&rest[..i], rest[i..].trim_start()),
        None => (rest, ""),
    };

    let (amount, name) = match normalize_unit(token.trim_end_matches(',')) {
        Some(unit) => (format!("{} {}", quantity, unit), after_token),
        None if glued => return (None, line),
        None => (quantity, rest),
    };
    let name = strip_of(name);

    if name.is_empty() {
        // "2 cups" alone has nothing to name.
        return (None, line);
    }
    (Some(amount), name)
}

fn strip_of(name: &str) -> &str {
    match name.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("of ") => name[3..].trim_start(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kosher_salt() {
        let line = classify("2 tablespoons kosher salt");
        assert_eq!(line.amount.as_deref(), Some("2 Tbsp"));
        assert_eq!(line.name, "Kosher Salt");
        assert_eq!(line.role, IngredientRole::Seasoning);
        assert_eq!(line.original, "2 tablespoons kosher salt");
    }

    #[test]
    fn test_quantity_forms() {
        let cases = [
            ("1/2 cup apple juice", "1/2 cup", "Apple Juice"),
            ("1 1/2 lbs pork shoulder", "1 1/2 lb", "Pork Shoulder"),
            ("½ tsp cayenne", "½ tsp", "Cayenne"),
            ("1½ cups water", "1½ cup", "Water"),
            ("2.5 pounds brisket", "2.5 lb", "Brisket"),
            ("2-3 racks spare ribs", "2-3", "Racks Spare Ribs"),
            ("2 to 3 oz. bourbon", "2 to 3 oz", "Bourbon"),
            ("500g chicken thighs", "500 g", "Chicken Thighs"),
            ("3 eggs", "3", "Eggs"),
        ];
        for (input, amount, name) in cases {
            let line = classify(input);
            assert_eq!(line.amount.as_deref(), Some(amount), "amount for {:?}", input);
            assert_eq!(line.name, name, "name for {:?}", input);
        }
    }

    #[test]
    fn test_no_amount() {
        let line = classify("Salt and pepper to taste");
        assert_eq!(line.amount, None);
        assert_eq!(line.name, "Salt And Pepper To Taste");
        assert_eq!(line.role, IngredientRole::Seasoning);

        let line = classify("2 cups");
        assert_eq!(line.amount, None);
        assert_eq!(line.name, "2 Cups");
    }

    #[test]
    fn test_of_is_dropped() {
        let line = classify("1 cup of beef broth");
        assert_eq!(line.amount.as_deref(), Some("1 cup"));
        assert_eq!(line.name, "Beef Broth");
    }

    #[test]
    fn test_annotations_are_stripped_from_name() {
        let line = classify("1 onion, diced");
        assert_eq!(line.name, "Onion");
        assert_eq!(line.preparation.as_deref(), Some("diced"));

        let line = classify("1 tsp salt (optional)");
        assert_eq!(line.amount.as_deref(), Some("1 tsp"));
        assert_eq!(line.name, "Salt");
        assert_eq!(line.role, IngredientRole::Seasoning);
        assert!(line.is_optional);

        let line = classify("2 tbsp maple syrup (alt: honey)");
        assert_eq!(line.name, "Maple Syrup");
        assert_eq!(line.alternative.as_deref(), Some("honey"));

        let line = classify("- 1 lb chicken thighs, cubed, optional");
        assert_eq!(line.name, "Chicken Thighs");
        assert_eq!(line.role, IngredientRole::MainProtein);
        assert_eq!(line.preparation.as_deref(), Some("cubed"));
        assert!(line.is_optional);
        assert_eq!(line.display(), "1 lb Chicken Thighs, cubed (optional)");
    }

    #[test]
    fn test_plain_line_has_no_annotations() {
        let line = classify("3 lbs pork shoulder");
        assert_eq!(line.preparation, None);
        assert_eq!(line.alternative, None);
        assert!(!line.is_optional);

        // Only a comma introduces a preparation note.
        assert_eq!(classify("1 cup warm water").name, "Warm Water");
    }

    #[test]
    fn test_single_letter_units() {
        assert_eq!(normalize_unit("t."), Some("tsp"));
        assert_eq!(normalize_unit("T."), Some("Tbsp"));
        assert_eq!(classify("1 t. cumin").amount.as_deref(), Some("1 tsp"));
        assert_eq!(classify("2 T butter").amount.as_deref(), Some("2 Tbsp"));
    }

    #[test]
    fn test_quantity_must_end_at_a_boundary() {
        let line = classify("12-inch tortillas");
        assert_eq!(line.amount, None);
        assert_eq!(line.name, "12-inch Tortillas");

        let line = classify("500g brisket");
        assert_eq!(line.amount.as_deref(), Some("500 g"));
        assert_eq!(line.name, "Brisket");
    }

    #[test]
    fn test_role_priority() {
        // Protein beats liquid.
        assert_eq!(role_for("chicken broth"), IngredientRole::MainProtein);
        // Liquid beats seasoning.
        assert_eq!(role_for("garlic oil"), IngredientRole::Liquid);
        assert_eq!(role_for("smoked paprika"), IngredientRole::Seasoning);
        assert_eq!(role_for("yellow onion"), IngredientRole::Unclassified);
    }

    #[test]
    fn test_role_matches_whole_words() {
        assert_eq!(role_for("kale"), IngredientRole::Unclassified);
        assert_eq!(role_for("saltine crackers"), IngredientRole::Unclassified);
        assert_eq!(role_for("Beef Short Ribs"), IngredientRole::MainProtein);
        assert_eq!(role_for("black peppercorns"), IngredientRole::Seasoning);
    }

    #[test]
    fn test_normalize_unit_table() {
        assert_eq!(normalize_unit("tablespoons"), Some("Tbsp"));
        assert_eq!(normalize_unit("tables"), Some("Tbsp"));
        assert_eq!(normalize_unit("TBS"), Some("Tbsp"));
        assert_eq!(normalize_unit("teaspoon"), Some("tsp"));
        assert_eq!(normalize_unit("cups"), Some("cup"));
        assert_eq!(normalize_unit("lbs"), Some("lb"));
        assert_eq!(normalize_unit("oz."), Some("oz"));
        assert_eq!(normalize_unit("ozes"), Some("oz"));
        assert_eq!(normalize_unit("brisket"), None);
    }

    #[test]
    fn test_normalize_units_is_idempotent() {
        for (_, canonical) in UNIT_ALIASES {
            assert_eq!(normalize_unit(canonical), Some(*canonical), "{}", canonical);
        }

        let once = normalize_units("2 tablespoons plus 1 teaspoon");
        assert_eq!(once, "2 Tbsp plus 1 tsp");
        assert_eq!(normalize_units(&once), once);
    }

    #[test]
    fn test_classification_is_pure() {
        let a = classify("1 lb pork belly");
        let b = classify("1 lb pork belly");
        assert_eq!(a, b);
    }

    #[test]
    fn test_classify_lines_skips_blanks_and_bullets() {
        let lines = classify_lines("- 1 cup water\n\n  \n* 2 tsp cumin\n•\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "Water");
        assert_eq!(lines[0].role, IngredientRole::Liquid);
        assert_eq!(lines[1].amount.as_deref(), Some("2 tsp"));
        assert_eq!(lines[1].original, "* 2 tsp cumin");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("kosher SALT"), "Kosher Salt");
        assert_eq!(title_case("  tri-tip  roast "), "Tri-tip Roast");
        assert_eq!(title_case(""), "");
    }
}
