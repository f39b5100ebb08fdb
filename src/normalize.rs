// 🔤 Name Normalizer - comparison keys for constituency and unit names
//
// normalize():     "St. Ives & Penwith CLP" → "saint ives penwith"
// canonical_key(): words of normalize(), sorted → "ives penwith saint"

use once_cell::sync::Lazy;
use regex::Regex;

static CONJUNCTIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\band\b|&").expect("conjunction pattern is valid"));

static SAINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bst\.?\b").expect("saint pattern is valid"));

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("punctuation pattern is valid"));

/// Canonicalize a free-text name for comparison.
///
/// Order matters: "CLP" is removed before lower-casing so only the literal
/// upper-case suffix goes; conjunctions and the "st" abbreviation are handled
/// before punctuation is stripped so "st." still sees its dot.
pub fn normalize(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = text.replace("CLP", "");
    let text = text.to_lowercase();
    let text = CONJUNCTIONS.replace_all(&text, "");
    let text = SAINT.replace_all(&text, "saint");
    let text = NON_WORD.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Word-order independent key: normalized words sorted and rejoined.
///
/// An empty result is never a valid key; callers must not insert or look it up.
pub fn canonical_key(text: &str) -> String {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return String::new();
    }

    let mut words: Vec<&str> = normalized.split(' ').collect();
    words.sort_unstable();
    words.join(" ")
}

/// Unit identity: "{unit} {entity}" lower-cased, or None if either half is blank.
pub fn combined_name(unit_name: &str, entity_name: &str) -> Option<String> {
    let unit = unit_name.trim();
    let entity = entity_name.trim();
    if unit.is_empty() || entity.is_empty() {
        return None;
    }
    Some(format!("{} {}", unit, entity).to_lowercase())
}
