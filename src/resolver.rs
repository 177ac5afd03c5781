//! Multi-tier catalog resolution.
//!
//! A record is tried against an ordered list of strategies, strongest signal
//! first; the first strategy that picks a candidate wins:
//!
//! 1. Exact key: ISRC lookup
//! 2. Fuzzy title+artist: structured search, title match, then per-candidate
//!    artist+title confirmation
//! 3. Fuzzy artist only: title-only search, artist match across all hits
//!
//! Provider errors abort the record and propagate; "nothing matched" is the
//! ordinary [`ResolutionOutcome::Unresolved`].

use log::debug;

use crate::config::MatchConfig;
use crate::matcher::FuzzyMatcher;
use crate::models::{CatalogCandidate, ResolutionAttempt, ResolutionInput, ResolutionOutcome};
use crate::normalize::clean_query_field_with_limit;
use crate::provider::{CatalogProvider, ProviderResult, SearchQuery};

// ============================================================================
// Strategy Plumbing
// ============================================================================

/// Record with its query fields cleaned once up front.
#[derive(Debug, Clone)]
pub struct PreparedInput<'a> {
    pub input: &'a ResolutionInput,
    pub clean_title: String,
    pub clean_artist: String,
}

impl<'a> PreparedInput<'a> {
    pub fn new(input: &'a ResolutionInput, max_chars: usize) -> Self {
        Self {
            input,
            clean_title: input
                .title
                .as_deref()
                .map(|t| clean_query_field_with_limit(t, max_chars))
                .unwrap_or_default(),
            clean_artist: clean_query_field_with_limit(&input.artist, max_chars),
        }
    }

    fn original_title(&self) -> &str {
        self.input.title.as_deref().unwrap_or("")
    }
}

/// Candidate a strategy settled on, with the score that decided it.
#[derive(Debug, Clone)]
pub struct StrategyHit {
    pub candidate: CatalogCandidate,
    pub confidence: f64,
}

/// One resolution tier.
pub trait ResolutionStrategy: Send + Sync {
    /// Tier reported when this strategy succeeds.
    fn attempt(&self) -> ResolutionAttempt;

    /// `Ok(None)` means "not this tier, try the next one".
    fn try_resolve(
        &self,
        record: &PreparedInput<'_>,
        provider: &dyn CatalogProvider,
        config: &MatchConfig,
    ) -> ProviderResult<Option<StrategyHit>>;
}

// ============================================================================
// Tier 1: Exact Key
// ============================================================================

pub struct ExactKeyStrategy;

impl ResolutionStrategy for ExactKeyStrategy {
    fn attempt(&self) -> ResolutionAttempt {
        ResolutionAttempt::ExactKey
    }

    fn try_resolve(
        &self,
        record: &PreparedInput<'_>,
        provider: &dyn CatalogProvider,
        _config: &MatchConfig,
    ) -> ProviderResult<Option<StrategyHit>> {
        let Some(code) = record.input.external_id.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if code.is_empty() {
            return Ok(None);
        }

        let key = SearchQuery::isrc(code).to_string();
        let hit = provider.search_exact(&key)?.into_iter().next();
        debug!("[exact-key] {} -> {}", key, hit.as_ref().map_or("none", |c| c.id.as_str()));
        Ok(hit.map(|candidate| StrategyHit {
            candidate,
            confidence: 1.0,
        }))
    }
}

// ============================================================================
// Tier 2: Fuzzy Title + Artist
// ============================================================================

pub struct FuzzyTitleArtistStrategy;

impl ResolutionStrategy for FuzzyTitleArtistStrategy {
    fn attempt(&self) -> ResolutionAttempt {
        ResolutionAttempt::FuzzyTitleArtist
    }

    fn try_resolve(
        &self,
        record: &PreparedInput<'_>,
        provider: &dyn CatalogProvider,
        config: &MatchConfig,
    ) -> ProviderResult<Option<StrategyHit>> {
        if record.clean_title.is_empty() || record.clean_artist.is_empty() {
            return Ok(None);
        }

        let query = SearchQuery::title_artist(&record.clean_title, &record.clean_artist).to_string();
        let mut candidates = provider.search(&query, config.title_artist_limit)?;
        if candidates.is_empty() {
            debug!("[title-artist] {} -> no candidates", query);
            return Ok(None);
        }

        // Best title across all candidates
        let title_matcher = FuzzyMatcher::with_min_score(
            candidates.iter().map(|c| c.title.clone()),
            config.index_min_score,
        );
        let title_match = title_matcher.check(record.original_title());
        if title_match.meets(config.title_match_threshold) {
            let matched = title_match.matched_original.as_deref();
            if let Some(pos) = candidates.iter().position(|c| Some(c.title.as_str()) == matched) {
                debug!("[title-artist] {} -> title match {:.3}", query, title_match.score);
                return Ok(Some(StrategyHit {
                    candidate: candidates.swap_remove(pos),
                    confidence: title_match.score,
                }));
            }
        }

        // No title cleared the bar on its own: accept a candidate whose artist
        // and title both match closely when scored in isolation
        for pos in 0..candidates.len() {
            let candidate = &candidates[pos];
            let artist_score = FuzzyMatcher::with_min_score([candidate.artist_string()], config.index_min_score)
                .check(&record.input.artist)
                .score;
            if artist_score < config.candidate_confirm_threshold {
                continue;
            }
            let title_score = FuzzyMatcher::with_min_score([candidate.title.clone()], config.index_min_score)
                .check(record.original_title())
                .score;
            if title_score >= config.candidate_confirm_threshold {
                debug!(
                    "[title-artist] {} -> confirmed artist {:.3} title {:.3}",
                    query, artist_score, title_score
                );
                return Ok(Some(StrategyHit {
                    candidate: candidates.swap_remove(pos),
                    confidence: artist_score.min(title_score),
                }));
            }
        }

        debug!("[title-artist] {} -> {} candidates, none close", query, candidates.len());
        Ok(None)
    }
}

// ============================================================================
// Tier 3: Title-Only Search, Artist Match
// ============================================================================

pub struct FuzzyArtistOnlyStrategy;

impl ResolutionStrategy for FuzzyArtistOnlyStrategy {
    fn attempt(&self) -> ResolutionAttempt {
        ResolutionAttempt::FuzzyArtistOnly
    }

    fn try_resolve(
        &self,
        record: &PreparedInput<'_>,
        provider: &dyn CatalogProvider,
        config: &MatchConfig,
    ) -> ProviderResult<Option<StrategyHit>> {
        if record.clean_title.is_empty() || record.clean_artist.is_empty() {
            return Ok(None);
        }

        let query = SearchQuery::title_only(&record.clean_title).to_string();
        let mut candidates = provider.search(&query, config.title_only_limit)?;
        if candidates.is_empty() {
            debug!("[artist-only] {} -> no candidates", query);
            return Ok(None);
        }

        let artist_matcher = FuzzyMatcher::with_min_score(
            candidates.iter().map(CatalogCandidate::artist_string),
            config.index_min_score,
        );
        let artist_match = artist_matcher.check(&record.input.artist);
        if !artist_match.meets(config.artist_only_threshold) {
            debug!("[artist-only] {} -> best artist {:.3}", query, artist_match.score);
            return Ok(None);
        }

        let matched = artist_match.matched_original.as_deref();
        let pos = candidates
            .iter()
            .position(|c| Some(c.artist_string().as_str()) == matched);
        Ok(pos.map(|pos| StrategyHit {
            candidate: candidates.swap_remove(pos),
            confidence: artist_match.score,
        }))
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// The default tier order.
pub fn default_strategies() -> Vec<Box<dyn ResolutionStrategy>> {
    vec![
        Box::new(ExactKeyStrategy),
        Box::new(FuzzyTitleArtistStrategy),
        Box::new(FuzzyArtistOnlyStrategy),
    ]
}

/// Resolves noisy records against a catalog provider.
pub struct CatalogResolver<P> {
    provider: P,
    config: MatchConfig,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl<P: CatalogProvider> CatalogResolver<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, MatchConfig::default())
    }

    pub fn with_config(provider: P, config: MatchConfig) -> Self {
        Self {
            provider,
            config,
            strategies: default_strategies(),
        }
    }

    /// Replace the tier list. Strategies run in the given order.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Try each tier in order, stopping at the first hit.
    pub fn resolve(&self, record: &ResolutionInput) -> ProviderResult<ResolutionOutcome> {
        let prepared = PreparedInput::new(record, self.config.query_field_max_chars);

        for strategy in &self.strategies {
            if let Some(hit) = strategy.try_resolve(&prepared, &self.provider, &self.config)? {
                return Ok(ResolutionOutcome::Resolved {
                    entity: hit.candidate.into(),
                    attempt: strategy.attempt(),
                    confidence: hit.confidence,
                });
            }
        }

        debug!(
            "[unresolved] title={:?} artist={:?}",
            record.title.as_deref().unwrap_or(""),
            record.artist
        );
        Ok(ResolutionOutcome::Unresolved)
    }
}

// ============================================================================
// TESTS
// ============================================================================
