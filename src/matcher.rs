//! Fuzzy matcher: index lookup plus substring bonus behind one `check` call.

use crate::index::{FuzzyIndex, FuzzyIndexBuilder};
use crate::models::MatchResult;
use crate::normalize::normalize_key;
use crate::scoring::SubstringBonusScorer;

/// Immutable matcher over a reference set. Safe to query concurrently.
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    index: FuzzyIndex,
    scorer: SubstringBonusScorer,
}

impl FuzzyMatcher {
    /// Wrap a frozen index.
    pub fn new(index: FuzzyIndex) -> Self {
        Self {
            index,
            scorer: SubstringBonusScorer::default(),
        }
    }

    /// Build a matcher over reference strings with the default index floor.
    pub fn build<S: AsRef<str>>(reference: &[S]) -> Self {
        Self::new(FuzzyIndex::build(reference))
    }

    /// Build a matcher from any iterator of strings with an explicit floor.
    pub fn with_min_score<I, S>(reference: I, min_score: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = FuzzyIndexBuilder::new().min_score(min_score);
        builder.extend(reference);
        Self::new(builder.freeze())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Best match for a raw query. Never fails: missing input, an empty
    /// reference set, or no candidate above the floor all give
    /// [`MatchResult::none`].
    pub fn check(&self, query: &str) -> MatchResult {
        let q = normalize_key(query);
        if q.is_empty() {
            return MatchResult::none();
        }

        let Some((ratio, matched_key)) = self.index.best_match(&q) else {
            return MatchResult::none();
        };
        let (bonus, hit) = self.scorer.bonus(&q, matched_key, ratio);

        MatchResult {
            score: ratio + bonus,
            matched_original: self.index.original(matched_key).map(str::to_string),
            exact_token_hit: hit,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FuzzyMatcher {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut builder = FuzzyIndexBuilder::new();
        builder.extend(iter);
        Self::new(builder.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_empty_query() {
        let matcher = FuzzyMatcher::build(&["Drake"]);
        assert_eq!(matcher.check(""), MatchResult::none());
        assert_eq!(matcher.check("  ?! "), MatchResult::none());
    }

    #[test]
    fn test_check_empty_reference() {
        let matcher = FuzzyMatcher::build::<String>(&[]);
        assert!(matcher.is_empty());
        assert_eq!(matcher.check("Drake"), MatchResult::none());
    }

    #[test]
    fn test_check_exact_normalized() {
        let matcher = FuzzyMatcher::build(&["The Weeknd", "Drake"]);
        let result = matcher.check("weeknd, THE");
        assert!((result.score - 1.0).abs() < 1e-12);
        assert_eq!(result.matched_original.as_deref(), Some("The Weeknd"));
        assert!(result.exact_token_hit);
    }

    #[test]
    fn test_check_returns_original_spelling() {
        let matcher: FuzzyMatcher = ["Columbia Records", "RCA"].into_iter().collect();
        let result = matcher.check("columbia records");
        assert_eq!(result.matched_original.as_deref(), Some("Columbia Records"));
    }

    #[test]
    fn test_check_bonus_applied() {
        let matcher = FuzzyMatcher::build(&["Blinding Light"]);
        let result = matcher.check("Blinding Lights");
        assert!(result.exact_token_hit);
        assert!(result.score > 0.97, "score was {}", result.score);
        assert!(result.score <= 1.0 + 1e-12);
    }

    #[test]
    fn test_check_no_bonus_without_token_hit() {
        let matcher = FuzzyMatcher::build(&["Columbia"]);
        let result = matcher.check("Colvmbia");
        assert!(!result.exact_token_hit);
        assert!(result.score > 0.9 && result.score < 1.0);
    }

    #[test]
    fn test_with_min_score() {
        let matcher = FuzzyMatcher::with_min_score(["Columbia"], 0.99);
        assert_eq!(matcher.check("Colvmbia"), MatchResult::none());
    }
}
