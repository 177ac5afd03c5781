//! Approximate string index over normalized keys.
//!
//! Keys are shingled into padded character n-grams (sizes 3 and 2) and stored
//! in inverted posting lists, so a query only ever touches entries that share
//! at least one gram with it. Candidates are ranked by cosine similarity of
//! gram-count vectors, then the best few are rescored with the mean of
//! Jaro-Winkler and the normalized Levenshtein ratio. Jaro-Winkler alone
//! over-rewards a shared prefix: "drakes" against "drake" would clear even a
//! strict 0.95 bar.
//!
//! Building goes through [`FuzzyIndexBuilder`]; [`FuzzyIndexBuilder::freeze`]
//! consumes it and returns an immutable [`FuzzyIndex`] that can be queried from
//! any number of threads.

use rustc_hash::FxHashMap;
use strsim::{jaro, normalized_levenshtein};

use crate::normalize::normalize_key;

// ============================================================================
// Index Constants
// ============================================================================

/// Smallest gram size, tried last.
pub const GRAM_SIZE_LOWER: usize = 2;

/// Largest gram size, tried first.
pub const GRAM_SIZE_UPPER: usize = 3;

/// Default similarity floor below which a candidate is not a match.
pub const DEFAULT_MIN_SCORE: f64 = 0.33;

/// How many cosine-ranked candidates get rescored.
pub const RESCORE_CANDIDATES: usize = 50;

/// Longest common prefix the Winkler adjustment rewards.
const WINKLER_PREFIX_CAP: usize = 4;

/// Winkler prefix scaling factor.
const WINKLER_PREFIX_WEIGHT: f64 = 0.1;

/// Padding character around keys before shingling.
const GRAM_PAD: char = '-';

// ============================================================================
// Builder
// ============================================================================

/// Mutable phase of index construction.
///
/// Duplicate keys keep their first insertion position but take the most
/// recently inserted original string.
#[derive(Debug, Default)]
pub struct FuzzyIndexBuilder {
    keys: Vec<String>,
    originals: FxHashMap<String, String>,
    min_score: Option<f64>,
}

impl FuzzyIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the similarity floor (default [`DEFAULT_MIN_SCORE`]).
    pub fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Normalize and add a reference string. Strings that normalize to the
    /// empty key can never be matched and are skipped.
    pub fn insert(&mut self, original: impl Into<String>) {
        let original = original.into();
        let key = normalize_key(&original);
        if key.is_empty() {
            return;
        }
        if !self.originals.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.originals.insert(key, original);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Finish construction. After this point the reference set cannot change.
    pub fn freeze(self) -> FuzzyIndex {
        let mut entries = Vec::with_capacity(self.keys.len());
        let mut exact = FxHashMap::default();
        let mut tables: Vec<GramTable> = (GRAM_SIZE_LOWER..=GRAM_SIZE_UPPER)
            .map(GramTable::new)
            .collect();

        let mut originals = self.originals;
        for (idx, key) in self.keys.into_iter().enumerate() {
            for table in tables.iter_mut() {
                table.add(idx as u32, &key);
            }
            exact.insert(key.clone(), idx);
            let original = originals.remove(&key).unwrap_or_else(|| key.clone());
            entries.push(IndexEntry { key, original });
        }

        FuzzyIndex {
            entries,
            exact,
            tables,
            min_score: self.min_score.unwrap_or(DEFAULT_MIN_SCORE),
        }
    }
}

impl<S: Into<String>> Extend<S> for FuzzyIndexBuilder {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for s in iter {
            self.insert(s);
        }
    }
}

// ============================================================================
// Frozen Index
// ============================================================================

#[derive(Debug, Clone)]
struct IndexEntry {
    key: String,
    original: String,
}

/// Inverted gram postings for one gram size.
#[derive(Debug, Clone)]
struct GramTable {
    gram_size: usize,
    postings: FxHashMap<String, Vec<(u32, u32)>>,
    norms: Vec<f64>,
}

impl GramTable {
    fn new(gram_size: usize) -> Self {
        Self {
            gram_size,
            postings: FxHashMap::default(),
            norms: Vec::new(),
        }
    }

    fn add(&mut self, idx: u32, key: &str) {
        let counts = gram_counts(key, self.gram_size);
        self.norms.push(vector_norm(&counts));
        for (gram, count) in counts {
            self.postings.entry(gram).or_default().push((idx, count));
        }
    }

    /// Cosine similarity of every entry sharing a gram with the query,
    /// best first, ties broken by insertion order.
    fn cosine_candidates(&self, query: &str) -> Vec<(f64, u32)> {
        let counts = gram_counts(query, self.gram_size);
        let query_norm = vector_norm(&counts);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut dot: FxHashMap<u32, u32> = FxHashMap::default();
        for (gram, count) in &counts {
            if let Some(posting) = self.postings.get(gram) {
                for &(idx, other) in posting {
                    *dot.entry(idx).or_insert(0) += count * other;
                }
            }
        }

        let mut scored: Vec<(f64, u32)> = dot
            .into_iter()
            .map(|(idx, d)| (d as f64 / (query_norm * self.norms[idx as usize]), idx))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored
    }
}

/// Immutable approximate-match index. `Send + Sync`; share it by reference or
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FuzzyIndex {
    entries: Vec<IndexEntry>,
    exact: FxHashMap<String, usize>,
    tables: Vec<GramTable>,
    min_score: f64,
}

impl FuzzyIndex {
    /// Build an index over reference strings in one step.
    pub fn build<S: AsRef<str>>(reference: &[S]) -> Self {
        let mut builder = FuzzyIndexBuilder::new();
        builder.extend(reference.iter().map(|s| s.as_ref().to_string()));
        builder.freeze()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Best reference key for an already-normalized query, with its raw
    /// similarity in [0, 1]. `None` when the index is empty or nothing clears
    /// the floor.
    pub fn best_match(&self, query_normalized: &str) -> Option<(f64, &str)> {
        if query_normalized.is_empty() || self.entries.is_empty() {
            return None;
        }
        if let Some(&idx) = self.exact.get(query_normalized) {
            return Some((1.0, self.entries[idx].key.as_str()));
        }

        // Larger grams first; fall back to smaller grams when nothing clears the floor
        for table in self.tables.iter().rev() {
            let candidates = table.cosine_candidates(query_normalized);
            if let Some((score, idx)) = self.rescore(query_normalized, &candidates) {
                return Some((score, self.entries[idx as usize].key.as_str()));
            }
        }
        None
    }

    /// Original string recorded for a key (last insertion wins).
    pub fn original(&self, key: &str) -> Option<&str> {
        self.exact
            .get(key)
            .map(|&idx| self.entries[idx].original.as_str())
    }

    fn rescore(&self, query: &str, candidates: &[(f64, u32)]) -> Option<(f64, u32)> {
        let mut best: Option<(f64, u32)> = None;
        for &(_, idx) in candidates.iter().take(RESCORE_CANDIDATES) {
            let score = similarity(query, &self.entries[idx as usize].key);
            let better = match best {
                None => true,
                Some((best_score, best_idx)) => {
                    score > best_score || (score == best_score && idx < best_idx)
                }
            };
            if better {
                best = Some((score, idx));
            }
        }
        best.filter(|(score, _)| *score >= self.min_score)
    }
}

// ============================================================================
// Gram Helpers
// ============================================================================

/// Count padded character n-grams: "abc" with size 2 → "-a", "ab", "bc", "c-".
fn gram_counts(key: &str, gram_size: usize) -> FxHashMap<String, u32> {
    let mut chars: Vec<char> = Vec::with_capacity(key.len() + gram_size + 1);
    chars.push(GRAM_PAD);
    chars.extend(key.chars());
    chars.push(GRAM_PAD);
    while chars.len() < gram_size {
        chars.push(GRAM_PAD);
    }

    let mut counts = FxHashMap::default();
    for window in chars.windows(gram_size) {
        *counts.entry(window.iter().collect::<String>()).or_insert(0) += 1;
    }
    counts
}

/// Rescoring measure: equal blend of prefix-weighted and edit-distance
/// similarity. Only identical keys score 1.0.
fn similarity(a: &str, b: &str) -> f64 {
    (jaro_winkler(a, b) + normalized_levenshtein(a, b)) / 2.0
}

/// Jaro-Winkler with the common prefix capped at four characters, so only an
/// identical pair can reach 1.0.
fn jaro_winkler(a: &str, b: &str) -> f64 {
    let sim = jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .take(WINKLER_PREFIX_CAP)
        .count();
    sim + WINKLER_PREFIX_WEIGHT * prefix as f64 * (1.0 - sim)
}

fn vector_norm(counts: &FxHashMap<String, u32>) -> f64 {
    counts
        .values()
        .map(|&c| (c as f64) * (c as f64))
        .sum::<f64>()
        .sqrt()
}

// ============================================================================
// TESTS
// ============================================================================
