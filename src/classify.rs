//! Signed / unsigned classification against label and artist rosters.
//!
//! Evaluation order, first hit wins:
//! 1. Caller already knows the track is signed
//! 2. Entity label contains a roster label (case-insensitive substring)
//! 3. Entity label fuzzily matches a roster label
//! 4. Entity artist fuzzily matches a signed-artist roster entry

use crate::config::MatchConfig;
use crate::matcher::FuzzyMatcher;
use crate::models::ClassificationSignal;

/// Classifier over one pair of rosters. Immutable after construction.
#[derive(Debug, Clone)]
pub struct SignedClassifier {
    labels_lower: Vec<String>,
    label_matcher: FuzzyMatcher,
    artist_matcher: FuzzyMatcher,
    label_fuzzy_threshold: f64,
    artist_roster_threshold: f64,
}

impl SignedClassifier {
    pub fn new(labels: &[String], artists: &[String], config: &MatchConfig) -> Self {
        // Blank entries would be a substring of every label
        let labels_lower: Vec<String> = labels
            .iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        let label_matcher = FuzzyMatcher::with_min_score(labels_lower.iter().cloned(), config.index_min_score);
        let artist_matcher = FuzzyMatcher::with_min_score(
            artists.iter().map(|a| a.trim()).filter(|a| !a.is_empty()).map(str::to_string),
            config.index_min_score,
        );

        Self {
            labels_lower,
            label_matcher,
            artist_matcher,
            label_fuzzy_threshold: config.label_fuzzy_threshold,
            artist_roster_threshold: config.artist_roster_threshold,
        }
    }

    pub fn label_count(&self) -> usize {
        self.labels_lower.len()
    }

    pub fn artist_count(&self) -> usize {
        self.artist_matcher.len()
    }

    /// Never fails; missing data just means fewer tiers can fire.
    pub fn classify(
        &self,
        entity_label: Option<&str>,
        entity_artist: &str,
        already_signed: bool,
    ) -> (bool, ClassificationSignal) {
        if already_signed {
            return (true, ClassificationSignal::None);
        }

        if let Some(label) = entity_label.map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty()) {
            if self.labels_lower.iter().any(|roster| label.contains(roster.as_str())) {
                return (true, ClassificationSignal::LabelExactSubstring);
            }

            let result = self.label_matcher.check(&label);
            let equals_match = result.matched_original.as_deref() == Some(label.as_str());
            if result.matched_original.is_some() && (result.score > self.label_fuzzy_threshold || equals_match) {
                return (true, ClassificationSignal::LabelFuzzy);
            }
        }

        if self.artist_matcher.check(entity_artist).meets(self.artist_roster_threshold) {
            return (true, ClassificationSignal::ArtistRosterFuzzy);
        }

        (false, ClassificationSignal::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn classifier(labels: &[&str], artists: &[&str]) -> SignedClassifier {
        SignedClassifier::new(&roster(labels), &roster(artists), &MatchConfig::default())
    }

    #[test]
    fn test_already_signed_short_circuits() {
        let c = classifier(&["Columbia"], &["Drake"]);
        assert_eq!(c.classify(None, "", true), (true, ClassificationSignal::None));
        assert_eq!(c.classify(Some("Nope"), "Nobody", true), (true, ClassificationSignal::None));
    }

    #[test]
    fn test_label_substring() {
        let c = classifier(&["Columbia", "RCA"], &[]);
        assert_eq!(
            c.classify(Some("Columbia Records"), "Someone", false),
            (true, ClassificationSignal::LabelExactSubstring)
        );
        assert_eq!(
            c.classify(Some("rca records"), "Someone", false),
            (true, ClassificationSignal::LabelExactSubstring)
        );
    }

    #[test]
    fn test_label_fuzzy() {
        let c = classifier(&["Columbia"], &[]);
        assert_eq!(c.classify(Some("Colvmbia"), "Someone", false), (true, ClassificationSignal::LabelFuzzy));
    }

    #[test]
    fn test_label_too_far_is_unsigned() {
        let c = classifier(&["Columbia"], &[]);
        assert_eq!(c.classify(Some("Indie Basement"), "Someone", false), (false, ClassificationSignal::None));
    }

    #[test]
    fn test_artist_roster() {
        let c = classifier(&[], &["Drake"]);
        assert_eq!(c.classify(None, "drake ", false), (true, ClassificationSignal::ArtistRosterFuzzy));
        assert_eq!(c.classify(Some(""), "Drake", false), (true, ClassificationSignal::ArtistRosterFuzzy));
        assert!(!c.classify(None, "Blake", false).0);
    }

    #[test]
    fn test_artist_suffix_variants_not_signed() {
        let c = classifier(&[], &["Future", "Drake"]);
        assert_eq!(c.classify(None, "Futures", false), (false, ClassificationSignal::None));
        assert_eq!(c.classify(None, "Drakes", false), (false, ClassificationSignal::None));
        assert_eq!(c.classify(None, "future", false), (true, ClassificationSignal::ArtistRosterFuzzy));
    }

    #[test]
    fn test_blank_roster_entries_ignored() {
        let c = classifier(&["", "  "], &[""]);
        assert_eq!(c.label_count(), 0);
        assert_eq!(c.artist_count(), 0);
        assert_eq!(c.classify(Some("Any Label"), "Any Artist", false), (false, ClassificationSignal::None));
    }

    #[test]
    fn test_empty_rosters() {
        let c = classifier(&[], &[]);
        assert_eq!(c.classify(Some("Columbia"), "Drake", false), (false, ClassificationSignal::None));
    }

    #[test]
    fn test_growing_roster_never_unsigns() {
        let labels = ["Columbia", "RCA", "Atlantic", "Interscope"];
        let artists = ["Drake", "The Weeknd", "Dua Lipa"];
        let cases = [
            (Some("Atlantic Recording Corp"), "Nobody"),
            (Some("Colvmbia"), "Nobody"),
            (None, "The Weeknd"),
            (Some("Self Released"), "Dua Lipa"),
        ];

        for n in 1..=labels.len() {
            let small = classifier(&labels[..n - 1], &artists[..n.min(artists.len()) - 1]);
            let large = classifier(&labels[..n], &artists[..n.min(artists.len())]);
            for (label, artist) in cases {
                if small.classify(label, artist, false).0 {
                    assert!(large.classify(label, artist, false).0, "{:?} / {} lost signed status", label, artist);
                }
            }
        }
    }
}
