//! Normalization for fuzzy catalog matching.
//!
//! Two different jobs live here:
//! - [`Normalizer::normalize`] produces the comparison key every fuzzy index
//!   is built on (case-folded, punctuation-free, token-sorted).
//! - [`clean_query_field`] prepares a raw title/artist for a catalog search
//!   query, where the provider's grammar is the constraint, not comparison.
//!
//! CRITICAL: Index keys and query keys must go through the same function.
//! Any change to `normalize_key` changes every score in the pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// KEY NORMALIZATION
// ============================================================================

/// Canonicalizes strings into comparison keys.
pub struct Normalizer;

impl Normalizer {
    /// Normalize an optional string. `None` behaves like the empty string.
    pub fn normalize(s: Option<&str>) -> String {
        normalize_key(s.unwrap_or(""))
    }
}

/// Build the comparison key for a string.
/// e.g., "The Weeknd" → "the weeknd", "Swift, Taylor" → "swift taylor",
///       "Beyoncé" (decomposed) → "beyoncé"
///
/// Non-ASCII letters and digits are kept: keys are compared, never displayed,
/// so there is no reason to transliterate.
pub fn normalize_key(s: &str) -> String {
    // Compose first so "e" + U+0301 survives as "é" instead of losing the accent
    // to the alphanumeric filter below.
    let lowered: String = s.nfc().collect::<String>().to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let mut tokens: Vec<&str> = kept.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ").trim().to_string()
}

// ============================================================================
// QUERY FIELD CLEANING
// ============================================================================

/// Longest field we send to the catalog search. Longer quoted fields make the
/// provider's query parser return nothing at all.
pub const QUERY_FIELD_MAX_CHARS: usize = 37;

/// Bracketed content: "(Remastered 2011)", "[Live]"
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").unwrap());

/// Featured-artist tail: "Song feat. Someone", "Artist Feat. Other"
static FEAT_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bfeat\..*$").unwrap());

/// Punctuation the search grammar chokes on.
const QUERY_PUNCTUATION: [char; 6] = ['[', ']', '&', ',', '(', ')'];

/// Clean a raw title or artist for use inside a catalog search query,
/// truncating to [`QUERY_FIELD_MAX_CHARS`].
/// e.g., "Blinding Lights (Chromatics Remix)" → "Blinding Lights"
///       "Calvin Harris feat. Rihanna" → "Calvin Harris"
pub fn clean_query_field(raw: &str) -> String {
    clean_query_field_with_limit(raw, QUERY_FIELD_MAX_CHARS)
}

/// Same as [`clean_query_field`] with an explicit character limit.
pub fn clean_query_field_with_limit(raw: &str, max_chars: usize) -> String {
    let without_brackets = BRACKETED.replace_all(raw, " ");
    let without_feat = FEAT_SEGMENT.replace(&without_brackets, "");
    let stripped: String = without_feat
        .chars()
        .filter(|c| !QUERY_PUNCTUATION.contains(c))
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
