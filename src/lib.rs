//! Catalog matching library - fuzzy matching, catalog resolution and
//! signed/unsigned classification shared by all binaries.

pub mod batch;
pub mod classify;
pub mod config;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod provider;
pub mod resolver;
pub mod roster;
pub mod safety;
pub mod scoring;
pub mod sqlite_catalog;

pub use classify::SignedClassifier;
pub use config::MatchConfig;
pub use index::{FuzzyIndex, FuzzyIndexBuilder};
pub use matcher::FuzzyMatcher;
pub use models::{
    CatalogCandidate, CatalogEntity, ClassificationSignal, MatchResult, ResolutionAttempt, ResolutionInput,
    ResolutionOutcome, ResolutionStats,
};
pub use normalize::Normalizer;
pub use provider::{CatalogProvider, ProviderError, ProviderResult, SearchQuery};
pub use resolver::CatalogResolver;
pub use sqlite_catalog::SqliteCatalog;
