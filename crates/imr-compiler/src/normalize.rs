//! Display names and node classification.

use imr_core::{EntityDescriptor, NodeKind, strip_brand_prefix};

/// Nouns that read the same in singular and plural.
const UNCOUNTABLE: &[&str] = &[
    "accommodation",
    "childcare",
    "clothing",
    "deer",
    "equipment",
    "fish",
    "fuel",
    "furniture",
    "healthcare",
    "housing",
    "information",
    "news",
    "parking",
    "police",
    "recycling",
    "seating",
    "series",
    "sheep",
    "shopping",
    "species",
    "water",
];

/// Singular nouns that happen to end in `s`.
const SINGULAR_S: &[&str] = &[
    "atlas", "bonus", "bus", "cactus", "campus", "canvas", "census", "chassis", "circus", "gas",
    "glass", "iris", "lens", "plus", "status", "tennis", "virus", "walrus",
];

/// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("analysis", "analyses"),
    ("axis", "axes"),
    ("calf", "calves"),
    ("child", "children"),
    ("crisis", "crises"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("half", "halves"),
    ("knife", "knives"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("loaf", "loaves"),
    ("man", "men"),
    ("mouse", "mice"),
    ("oasis", "oases"),
    ("person", "people"),
    ("shelf", "shelves"),
    ("thesis", "theses"),
    ("thief", "thieves"),
    ("tooth", "teeth"),
    ("wife", "wives"),
    ("wolf", "wolves"),
    ("woman", "women"),
];

/// Name shown to users for an entity.
///
/// The last word is pluralized ("fast food restaurant" becomes "fast food
/// restaurants") and the brand qualifier is dropped, so "brand:lidl" reads
/// "lidls". Brand tokens that are not plain words ("h&m") stay as they are.
#[must_use]
pub fn display_name(name: &str) -> String {
    let name = strip_brand_prefix(name);
    match name.rsplit_once(' ') {
        Some((head, last)) => format!("{head} {}", inflect_word(last)),
        None => inflect_word(&name),
    }
}

fn inflect_word(word: &str) -> String {
    if is_plural(word) {
        word.to_string()
    } else {
        pluralize(word)
    }
}

/// Whether `word` should be left alone by [`pluralize`]: it is already plural,
/// has no plural form, or is not a plain word.
#[must_use]
pub fn is_plural(word: &str) -> bool {
    if !is_plain_word(word) {
        return true;
    }
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return true;
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return true;
    }
    if IRREGULAR.iter().any(|(singular, _)| *singular == lower) {
        return false;
    }
    lower.ends_with('s') && !lower.ends_with("ss") && !SINGULAR_S.contains(&lower.as_str())
}

/// English plural of a single word.
#[must_use]
pub fn pluralize(word: &str) -> String {
    if !is_plain_word(word) {
        return word.to_string();
    }
    let lower = word.to_ascii_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return match_case(word, plural);
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        return format!("{word}es");
    }
    let consonant_y = lower
        .strip_suffix('y')
        .and_then(|stem| stem.chars().next_back())
        .is_some_and(|ch| !is_vowel(ch));
    if consonant_y {
        return format!("{}ies", &word[..word.len() - 1]);
    }
    format!("{word}s")
}

/// Letters, hyphens and apostrophes only. Brand-like tokens ("h&m", "7-eleven")
/// are never inflected.
fn is_plain_word(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|ch| ch.is_alphabetic() || ch == '-' || ch == '\'')
}

const fn is_vowel(ch: char) -> bool {
    matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = replacement.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    } else {
        replacement.to_string()
    }
}

/// Cluster iff the model asked for a minimum point count.
#[must_use]
pub fn classify(entity: &EntityDescriptor) -> NodeKind {
    if entity.minpoints.is_some() {
        NodeKind::Cluster
    } else {
        NodeKind::Nwr
    }
}
