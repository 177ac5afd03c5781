//! Tunable thresholds and limits.
//!
//! Every field defaults to the constant the pipeline was tuned with, so a
//! config file only needs the values it overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::index::DEFAULT_MIN_SCORE;
use crate::normalize::QUERY_FIELD_MAX_CHARS;
use crate::scoring::{
    ARTIST_ONLY_THRESHOLD, ARTIST_ROSTER_THRESHOLD, CANDIDATE_CONFIRM_THRESHOLD,
    LABEL_FUZZY_THRESHOLD, TITLE_MATCH_THRESHOLD,
};

/// Candidates requested from a title+artist search
pub const TITLE_ARTIST_LIMIT: usize = 10;

/// Candidates requested from a title-only search
pub const TITLE_ONLY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    pub title_match_threshold: f64,
    pub candidate_confirm_threshold: f64,
    pub artist_only_threshold: f64,
    pub label_fuzzy_threshold: f64,
    pub artist_roster_threshold: f64,
    pub title_artist_limit: usize,
    pub title_only_limit: usize,
    pub query_field_max_chars: usize,
    pub index_min_score: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            title_match_threshold: TITLE_MATCH_THRESHOLD,
            candidate_confirm_threshold: CANDIDATE_CONFIRM_THRESHOLD,
            artist_only_threshold: ARTIST_ONLY_THRESHOLD,
            label_fuzzy_threshold: LABEL_FUZZY_THRESHOLD,
            artist_roster_threshold: ARTIST_ROSTER_THRESHOLD,
            title_artist_limit: TITLE_ARTIST_LIMIT,
            title_only_limit: TITLE_ONLY_LIMIT,
            query_field_max_chars: QUERY_FIELD_MAX_CHARS,
            index_min_score: DEFAULT_MIN_SCORE,
        }
    }
}

impl MatchConfig {
    /// Load from a JSON file. Omitted fields keep their defaults; unknown
    /// fields are rejected so typos don't silently fall back.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Thresholds must be similarities and limits must request something.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("title_match_threshold", self.title_match_threshold),
            ("candidate_confirm_threshold", self.candidate_confirm_threshold),
            ("artist_only_threshold", self.artist_only_threshold),
            ("label_fuzzy_threshold", self.label_fuzzy_threshold),
            ("artist_roster_threshold", self.artist_roster_threshold),
            ("index_min_score", self.index_min_score),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be in [0.0, 1.0], got {}", name, value);
            }
        }
        if self.title_artist_limit == 0 || self.title_only_limit == 0 {
            anyhow::bail!("search limits must be at least 1");
        }
        if self.query_field_max_chars == 0 {
            anyhow::bail!("query_field_max_chars must be at least 1");
        }
        Ok(())
    }
}
