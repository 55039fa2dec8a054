/// Address normalization for the reconciliation pipeline.
///
/// Turns raw free-text addresses into a canonical token form and extracts a
/// postal-code-like fragment for the matcher. Everything here is a pure
/// function over one input: malformed text yields a best-effort canonical
/// form with an empty fragment, never an error.
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::models::NormalizedAddress;

/// Street-type and directional abbreviations, expanded as whole tokens only.
///
/// Tokens are compared after lowercasing and punctuation stripping, so both
/// "St." and "st" expand to "street" while "stanton" is left alone.
static ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("blvd", "boulevard"),
    ("rd", "road"),
    ("dr", "drive"),
    ("ln", "lane"),
    ("ct", "court"),
    ("pl", "place"),
    ("pkwy", "parkway"),
    ("cir", "circle"),
    ("sq", "square"),
    ("hwy", "highway"),
    ("ter", "terrace"),
    ("trl", "trail"),
    ("xing", "crossing"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
    ("ne", "northeast"),
    ("nw", "northwest"),
    ("se", "southeast"),
    ("sw", "southwest"),
    ("apt", "apartment"),
    ("ste", "suite"),
];

static ABBREVIATION_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| ABBREVIATIONS.iter().copied().collect());

/// The wildcard character in postal fragments; stands for one unknown digit.
pub const WILDCARD: char = 'X';

/// Fixed-width postal fragment: five digits and/or wildcards, whole token.
static FRAGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9xX]{5}$").unwrap());

/// Normalizes a raw address into its canonical form and extracts the
/// trailing postal fragment, if one exists.
///
/// Steps: lowercase, collapse whitespace, expand abbreviations as whole
/// tokens, strip punctuation (digits inside numeric tokens survive), collapse
/// duplicate words (all-digit tokens are always kept). The fragment is the
/// final token when it is exactly five characters of digits and/or `X`.
pub fn normalize(raw: &str) -> NormalizedAddress {
    let lowered = raw.to_lowercase();

    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens: Vec<String> = Vec::new();

    for word in lowered.split_whitespace() {
        // Punctuation goes first so "blvd." and "blvd" normalize alike.
        let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }

        let expanded = ABBREVIATION_MAP
            .get(cleaned.as_str())
            .map(|e| (*e).to_string())
            .unwrap_or(cleaned);

        // Address feeds sometimes duplicate the street name; keep the first
        // occurrence. Numeric tokens (house numbers, postal codes) always stay.
        let numeric = expanded.chars().all(|c| c.is_ascii_digit());
        if numeric || seen.insert(expanded.clone()) {
            tokens.push(expanded);
        }
    }

    let fragment = tokens
        .last()
        .map(|token| extract_fragment(token))
        .unwrap_or_default();

    NormalizedAddress {
        canonical: tokens.join(" "),
        fragment,
    }
}

/// Returns the uppercase fragment when the token is a 5-character group of
/// digits and/or the wildcard, otherwise the empty string.
fn extract_fragment(token: &str) -> String {
    if FRAGMENT_RE.is_match(token) {
        token.to_ascii_uppercase()
    } else {
        String::new()
    }
}

/// Canonicalizes an explicit postal-code column value into fragment form.
///
/// Wildcard-bearing values keep their digit/wildcard shape ("325xx" becomes
/// "325XX"); plain values are reduced to their digits, truncated to five, and
/// zero-padded ("401" becomes "00401"). Returns the empty string when the
/// value carries no digits at all.
pub fn normalize_postal_hint(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == WILDCARD)
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return String::new();
    }

    if cleaned.contains(WILDCARD) {
        let mut fragment = cleaned;
        fragment.truncate(5);
        return fragment;
    }

    let mut digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.truncate(5);
    format!("{:0>5}", digits)
}
