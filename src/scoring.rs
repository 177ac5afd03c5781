//! Score thresholds and the substring bonus.
//!
//! Raw n-gram similarity under-rewards matches where whole words coincide
//! exactly ("weeknd" inside "the weeknd"). The substring bonus lifts those
//! scores towards 1.0 without ever exceeding the room that was left.

// ============================================================================
// Score Thresholds
// ============================================================================

/// Title match needed to accept a title+artist search candidate
pub const TITLE_MATCH_THRESHOLD: f64 = 0.75;

/// Per-candidate artist AND title match needed when no title cleared
/// [`TITLE_MATCH_THRESHOLD`]
pub const CANDIDATE_CONFIRM_THRESHOLD: f64 = 0.8;

/// Artist match needed to accept a title-only search candidate
pub const ARTIST_ONLY_THRESHOLD: f64 = 0.75;

/// Label fuzzy score must be strictly above this to count as signed
pub const LABEL_FUZZY_THRESHOLD: f64 = 0.9;

/// Artist roster score needed to count as signed. Stricter than labels:
/// artist names are longer and less template-like.
pub const ARTIST_ROSTER_THRESHOLD: f64 = 0.95;

// ============================================================================
// Substring Bonus
// ============================================================================

/// Token length divisor in the bonus coefficient `exp(len / scale) - 1`.
pub const BONUS_LENGTH_SCALE: f64 = 10.0;

/// Largest share of the remaining residual a single token may take.
pub const BONUS_MAX_RESIDUAL_SHARE: f64 = 0.5;

/// Rewards exact token-level substring hits between a query and its best
/// fuzzy match.
#[derive(Debug, Clone, Copy)]
pub struct SubstringBonusScorer {
    length_scale: f64,
    max_residual_share: f64,
}

impl Default for SubstringBonusScorer {
    fn default() -> Self {
        Self {
            length_scale: BONUS_LENGTH_SCALE,
            max_residual_share: BONUS_MAX_RESIDUAL_SHARE,
        }
    }
}

impl SubstringBonusScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additional score for `query_normalized` given its match and the match's
    /// base similarity. Returns `(additional, exact_hit)`.
    ///
    /// Tokens are applied in split order and each one is capped against the
    /// residual left over by the tokens before it, not against the initial
    /// residual. Downstream thresholds were tuned against this sequence; do not
    /// replace it with a per-token formula over the initial residual.
    pub fn bonus(&self, query_normalized: &str, matched_normalized: &str, base_ratio: f64) -> (f64, bool) {
        let mut residual = 1.0 - base_ratio;
        let mut additional = 0.0;
        let mut exact_hit = false;

        for token in query_normalized.split_whitespace() {
            if !matched_normalized.contains(token) {
                continue;
            }
            let coefficient = (token.chars().count() as f64 / self.length_scale).exp() - 1.0;
            let value = (residual * coefficient).min(residual * self.max_residual_share);
            additional += value;
            residual -= value;
            exact_hit = true;
        }

        (additional, exact_hit)
    }
}

// ============================================================================
// TESTS
// ============================================================================
