//! Core data models for catalog resolution and classification.
//!
//! This module contains the match, candidate, entity and outcome types shared
//! by the matcher, resolver, classifier and batch pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Fuzzy Matching
// ============================================================================

/// Result of one fuzzy lookup.
///
/// `score` is the corrected (post-bonus) similarity. It is not clamped; with
/// the bonus capped against the residual it stays at or below 1.0 up to float
/// rounding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub score: f64,
    pub matched_original: Option<String>,
    pub exact_token_hit: bool,
}

impl MatchResult {
    /// The zero result: no usable query, empty reference set, or nothing above
    /// the index floor.
    pub fn none() -> Self {
        Self {
            score: 0.0,
            matched_original: None,
            exact_token_hit: false,
        }
    }

    /// True when a match exists and its score reaches `threshold`.
    pub fn meets(&self, threshold: f64) -> bool {
        self.matched_original.is_some() && self.score >= threshold
    }
}

impl Default for MatchResult {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// One search hit returned by a catalog provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: String,
    pub title: String,
    pub artist_names: Vec<String>, // Credited order
    pub album: Option<String>,
    pub label: Option<String>,
    pub isrc: Option<String>,
    pub popularity: Option<i32>, // 0-100
}

impl CatalogCandidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist_names: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist_names,
            ..Default::default()
        }
    }

    /// All credited artists joined by a single space, the form artist
    /// matching compares against.
    pub fn artist_string(&self) -> String {
        self.artist_names.join(" ")
    }
}

/// Canonical catalog record a noisy input resolved to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CatalogEntity {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub label: Option<String>,
    pub isrc: Option<String>,
    pub popularity: Option<i32>,
}

impl CatalogEntity {
    pub fn artist_string(&self) -> String {
        self.artists.join(" ")
    }
}

impl From<CatalogCandidate> for CatalogEntity {
    fn from(c: CatalogCandidate) -> Self {
        Self {
            id: c.id,
            title: c.title,
            artists: c.artist_names,
            album: c.album,
            label: c.label,
            isrc: c.isrc,
            popularity: c.popularity,
        }
    }
}

// ============================================================================
// Resolution Models
// ============================================================================

/// Noisy record to resolve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionInput {
    #[serde(default, alias = "isrc")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub artist: String,
}

impl ResolutionInput {
    pub fn new(external_id: Option<&str>, title: Option<&str>, artist: &str) -> Self {
        Self {
            external_id: external_id.map(str::to_string),
            title: title.map(str::to_string),
            artist: artist.to_string(),
        }
    }
}

/// Which resolution tier produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAttempt {
    ExactKey,
    FuzzyTitleArtist,
    FuzzyArtistOnly,
    Unresolved,
}

impl fmt::Display for ResolutionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactKey => write!(f, "exact-key"),
            Self::FuzzyTitleArtist => write!(f, "fuzzy-title-artist"),
            Self::FuzzyArtistOnly => write!(f, "fuzzy-artist-only"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Result of resolving one record. `Unresolved` is a normal, common outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolutionOutcome {
    Resolved {
        entity: CatalogEntity,
        attempt: ResolutionAttempt,
        confidence: f64,
    },
    Unresolved,
}

impl ResolutionOutcome {
    pub fn attempt(&self) -> ResolutionAttempt {
        match self {
            Self::Resolved { attempt, .. } => *attempt,
            Self::Unresolved => ResolutionAttempt::Unresolved,
        }
    }

    pub fn entity(&self) -> Option<&CatalogEntity> {
        match self {
            Self::Resolved { entity, .. } => Some(entity),
            Self::Unresolved => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Resolved { confidence, .. } => Some(*confidence),
            Self::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

// ============================================================================
// Classification Models
// ============================================================================

/// Which tier decided a signed classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSignal {
    LabelExactSubstring,
    LabelFuzzy,
    ArtistRosterFuzzy,
    None,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-tier counters for a batch run.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ResolutionStats {
    // Resolution tiers
    pub exact_key: usize,
    pub fuzzy_title_artist: usize,
    pub fuzzy_artist_only: usize,
    pub unresolved: usize,
    pub provider_errors: usize, // Records whose resolution failed on the provider

    // Classification signals
    pub already_signed: usize,
    pub signed_label_substring: usize,
    pub signed_label_fuzzy: usize,
    pub signed_artist_roster: usize,
    pub not_signed: usize,

    // Totals
    pub total_records: usize,
    pub elapsed_seconds: f64,
}

impl ResolutionStats {
    pub fn record_attempt(&mut self, attempt: ResolutionAttempt) {
        match attempt {
            ResolutionAttempt::ExactKey => self.exact_key += 1,
            ResolutionAttempt::FuzzyTitleArtist => self.fuzzy_title_artist += 1,
            ResolutionAttempt::FuzzyArtistOnly => self.fuzzy_artist_only += 1,
            ResolutionAttempt::Unresolved => self.unresolved += 1,
        }
    }

    pub fn record_classification(&mut self, signed: bool, signal: ClassificationSignal) {
        match (signed, signal) {
            (true, ClassificationSignal::LabelExactSubstring) => self.signed_label_substring += 1,
            (true, ClassificationSignal::LabelFuzzy) => self.signed_label_fuzzy += 1,
            (true, ClassificationSignal::ArtistRosterFuzzy) => self.signed_artist_roster += 1,
            (true, ClassificationSignal::None) => self.already_signed += 1,
            (false, _) => self.not_signed += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.exact_key + self.fuzzy_title_artist + self.fuzzy_artist_only
    }

    /// Resolution rate as a percentage
    pub fn resolution_rate(&self) -> f64 {
        if self.total_records == 0 {
            0.0
        } else {
            100.0 * self.resolved() as f64 / self.total_records as f64
        }
    }

    /// Log stats in JSON format
    pub fn log_summary(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            log::info!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
