//! Heuristic recipe extraction from plain text.
//!
//! Handles text scraped from a web page or read off a photo by OCR. The first
//! line is taken as the name, section headers ("Ingredients", "Directions",
//! "Rub", "Notes") split the rest, and labeled lines ("Wood: hickory") or
//! pattern matches fill in the scalar fields. Every field gets a confidence
//! reflecting how it was found.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::ingredient_classifier::{classify, title_case};
use crate::types::{ExtractedFields, IngredientRole, RecipeKind, ScoredField};

/// Value came from an explicit "Label: value" line.
const LABELED: f64 = 0.9;
/// Value came from under a matching section header.
const SECTION: f64 = 0.85;
/// Exactly one pattern match in the text.
const SINGLE_MATCH: f64 = 0.7;
/// Name taken from a short first line.
const FIRST_LINE: f64 = 0.7;
/// Seasonings picked out of the ingredient list by role.
const DERIVED: f64 = 0.6;
/// Several conflicting matches, or lines guessed without a header.
const AMBIGUOUS: f64 = 0.4;
/// First line too long to be a plausible title.
const LONG_FIRST_LINE: f64 = 0.3;

const MAX_TITLE_LEN: usize = 80;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^#*\s*(ingredients?|for the rub|spice rub|dry rub|rub|seasonings?|directions?|instructions?|method|steps?|preparation|notes?|tips?)\s*:?\s*$",
    )
    .expect("header pattern is valid")
});

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(serves|servings|yield|makes|cook time|total time|smoke time|time|smoker temp|pit temp|temperature|temp|smoke wood|woods?)\s*:\s*(.+)$",
    )
    .expect("label pattern is valid")
});

static TEMPERATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{2,3})\s*(?:°|º|degrees?)?\s*([FC])\b")
        .expect("temperature pattern is valid")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+(?:\.\d+)?(?:\s*(?:-|–|to)\s*\d+(?:\.\d+)?)?)\s*(hours?|hrs?|minutes?|mins?)\b",
    )
    .expect("time pattern is valid")
});

static WOOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(post oak|red oak|white oak|hickory|mesquite|pecan|cherry|apple|maple|alder|peach|walnut|oak)\b",
    )
    .expect("wood pattern is valid")
});

/// Lines mentioning smoke fuel; wood names elsewhere are usually fruit.
static WOOD_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(wood|woods|chunks?|chips?|pellets?|splits?|logs?|smoke|smoking|smoked)\b")
        .expect("wood context pattern is valid")
});

static SERVES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:serves|servings?|yields?|makes)\s*:?\s*(\d+(?:\s*(?:-|–|to)\s*\d+)?)")
        .expect("serves pattern is valid")
});

static STEP_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:step\s*\d+\s*[:.)-]?|\d+\s*[.)]|[-*•·])\s*")
        .expect("step prefix pattern is valid")
});

static LEADING_QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•·]\s*)?[\d½¼¾⅓⅔⅛⅜⅝⅞]").expect("leading quantity pattern is valid")
});

/// Fields pulled from text plus how confident the extractor is in each.
#[derive(Debug, Clone, PartialEq)]
pub struct TextExtraction {
    pub fields: ExtractedFields,
    pub confidence: HashMap<ScoredField, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Ingredients,
    Seasonings,
    Directions,
    Notes,
}

fn section_for(header: &str) -> Section {
    let header = header.to_lowercase();
    if header.starts_with("ingredient") {
        Section::Ingredients
    } else if header.contains("rub") || header.starts_with("seasoning") {
        Section::Seasonings
    } else if header.starts_with("note") || header.starts_with("tip") {
        Section::Notes
    } else {
        Section::Directions
    }
}

fn label_field(label: &str) -> ScoredField {
    let label = label.to_lowercase();
    if label.contains("time") {
        ScoredField::Time
    } else if label.contains("temp") {
        ScoredField::Temperature
    } else if label.contains("wood") {
        ScoredField::Wood
    } else {
        ScoredField::Serves
    }
}

/// Lines sorted by the section they appeared under.
#[derive(Debug, Default)]
struct Sections<'a> {
    name: Option<&'a str>,
    preamble: Vec<&'a str>,
    ingredients: Vec<&'a str>,
    seasonings: Vec<&'a str>,
    directions: Vec<&'a str>,
    notes: Vec<&'a str>,
    labeled: HashMap<ScoredField, String>,
    saw_ingredients_header: bool,
    saw_seasonings_header: bool,
    saw_directions_header: bool,
}

impl<'a> Sections<'a> {
    fn split(text: &'a str) -> Self {
        let mut sections = Sections::default();
        let mut current = Section::Preamble;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(caps) = HEADER_RE.captures(line) {
                current = section_for(&caps[1]);
                match current {
                    Section::Ingredients => sections.saw_ingredients_header = true,
                    Section::Seasonings => sections.saw_seasonings_header = true,
                    Section::Directions => sections.saw_directions_header = true,
                    Section::Preamble | Section::Notes => {}
                }
                continue;
            }

            if let Some(caps) = LABEL_RE.captures(line) {
                sections
                    .labeled
                    .entry(label_field(&caps[1]))
                    .or_insert_with(|| caps[2].trim().to_string());
                continue;
            }

            if sections.name.is_none() && current == Section::Preamble {
                sections.name = Some(line.trim_start_matches('#').trim());
                continue;
            }

            match current {
                Section::Preamble => sections.preamble.push(line),
                Section::Ingredients => sections.ingredients.push(line),
                Section::Seasonings => sections.seasonings.push(line),
                Section::Directions => sections.directions.push(line),
                Section::Notes => sections.notes.push(line),
            }
        }

        sections
    }

    /// Lines outside the ingredient lists, where times and temperatures live.
    fn prose(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.preamble
            .iter()
            .chain(self.directions.iter())
            .chain(self.notes.iter())
            .copied()
    }
}

/// Extract recipe fields from free text.
pub fn extract(kind: RecipeKind, text: &str) -> TextExtraction {
    let mut sections = Sections::split(text);
    let mut fields = ExtractedFields::default();
    let mut confidence = HashMap::new();

    // Without headers, guess from the shape of preamble lines.
    let mut ingredients_guessed = false;
    let mut directions_guessed = false;
    if !sections.saw_ingredients_header && !sections.saw_directions_header {
        for line in std::mem::take(&mut sections.preamble) {
            if LEADING_QUANTITY_RE.is_match(line) {
                sections.ingredients.push(line);
                ingredients_guessed = true;
            } else if line.ends_with('.') || line.len() > 60 {
                sections.directions.push(line);
                directions_guessed = true;
            } else {
                sections.preamble.push(line);
            }
        }
    }

    if let Some(name) = sections.name.filter(|n| !n.is_empty()) {
        let score = if name.len() <= MAX_TITLE_LEN && !name.ends_with('.') {
            FIRST_LINE
        } else {
            LONG_FIRST_LINE
        };
        fields.name = Some(name.to_string());
        confidence.insert(ScoredField::Name, score);
    }

    let prose: Vec<&str> = sections.prose().collect();

    let temperatures = collect_matches(&prose, &TEMPERATURE_RE, |caps| {
        format!("{}°{}", &caps[1], caps[2].to_uppercase())
    });
    let times = collect_matches(&prose, &TIME_RE, |caps| {
        format!("{} {}", &caps[1], time_unit(&caps[1], &caps[2]))
    });
    let wood_lines: Vec<&str> = prose
        .iter()
        .copied()
        .filter(|l| WOOD_CONTEXT_RE.is_match(l))
        .collect();
    let woods = collect_matches(&wood_lines, &WOOD_RE, |caps| title_case(&caps[1]));
    let serves = collect_matches(&prose, &SERVES_RE, |caps| caps[1].to_string());

    for (field, found) in [
        (ScoredField::Temperature, temperatures),
        (ScoredField::Time, times),
        (ScoredField::Wood, woods),
        (ScoredField::Serves, serves),
    ] {
        let labeled = sections.labeled.remove(&field);
        let Some((value, score)) = pick_value(labeled, &found) else {
            continue;
        };
        if found.len() > 1 {
            fields.candidates.insert(field, found);
        }
        match field {
            ScoredField::Temperature => fields.temperature = Some(value),
            ScoredField::Time => fields.time = Some(value),
            // Labeled and matched woods read the same: "Post Oak", "Cherry".
            ScoredField::Wood => fields.wood = Some(title_case(&value)),
            _ => fields.serves = Some(value),
        }
        confidence.insert(field, score);
    }

    let ingredient_lines: Vec<_> = sections.ingredients.iter().map(|l| classify(l)).collect();
    let seasoning_lines: Vec<_> = sections.seasonings.iter().map(|l| classify(l)).collect();

    if !ingredient_lines.is_empty() {
        fields.ingredients = ingredient_lines.iter().map(|l| l.display()).collect();
        let score = if ingredients_guessed { AMBIGUOUS } else { SECTION };
        confidence.insert(ScoredField::Ingredients, score);
    }

    match kind {
        RecipeKind::Smoking => {
            if !seasoning_lines.is_empty() {
                fields.seasonings = seasoning_lines.iter().map(|l| l.display()).collect();
                confidence.insert(ScoredField::Seasonings, SECTION);
            } else {
                fields.seasonings = ingredient_lines
                    .iter()
                    .filter(|l| l.role == IngredientRole::Seasoning)
                    .map(|l| l.display())
                    .collect();
                if !fields.seasonings.is_empty() {
                    confidence.insert(ScoredField::Seasonings, DERIVED);
                }
            }
        }
        RecipeKind::Standard => {
            fields
                .ingredients
                .extend(seasoning_lines.iter().map(|l| l.display()));
            if sections.saw_seasonings_header && !seasoning_lines.is_empty() {
                confidence.entry(ScoredField::Ingredients).or_insert(SECTION);
            }
        }
    }

    fields.raw_ingredients = ingredient_lines.into_iter().chain(seasoning_lines).collect();

    fields.directions = sections
        .directions
        .iter()
        .map(|l| STEP_PREFIX_RE.replace(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if !fields.directions.is_empty() {
        let score = if directions_guessed { AMBIGUOUS } else { SECTION };
        confidence.insert(ScoredField::Directions, score);
    }

    if !sections.notes.is_empty() {
        fields.notes = Some(sections.notes.join("\n"));
    }

    tracing::debug!(
        kind = %kind,
        fields = confidence.len(),
        raw_ingredients = fields.raw_ingredients.len(),
        "Extracted fields from text"
    );

    TextExtraction { fields, confidence }
}

/// Every distinct match across `lines`, in order of appearance.
fn collect_matches(
    lines: &[&str],
    re: &Regex,
    format: impl Fn(&regex::Captures<'_>) -> String,
) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in lines {
        for caps in re.captures_iter(line) {
            let value = format(&caps);
            if !found.contains(&value) {
                found.push(value);
            }
        }
    }
    found
}

/// A labeled value wins; otherwise the first match, trusted less when there
/// were several.
fn pick_value(labeled: Option<String>, found: &[String]) -> Option<(String, f64)> {
    if let Some(value) = labeled.filter(|v| !v.is_empty()) {
        return Some((value, LABELED));
    }
    match found {
        [] => None,
        [only] => Some((only.clone(), SINGLE_MATCH)),
        [first, ..] => Some((first.clone(), AMBIGUOUS)),
    }
}

fn time_unit(quantity: &str, unit: &str) -> &'static str {
    let singular = quantity.trim() == "1";
    match (unit.to_lowercase().starts_with('h'), singular) {
        (true, true) => "hour",
        (true, false) => "hours",
        (false, true) => "minute",
        (false, false) => "minutes",
    }
}
