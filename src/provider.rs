//! Catalog provider contract.
//!
//! The resolver never talks to a catalog directly; it renders a
//! [`SearchQuery`] and hands it to a [`CatalogProvider`]. Retries, timeouts and
//! rate limits are the provider's business.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::CatalogCandidate;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// For network-backed providers; the SQLite catalog never times out.
    #[error("Catalog request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed catalog response: {0}")]
    Malformed(String),

    #[error("Catalog database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

// ============================================================================
// Provider Trait
// ============================================================================

/// A searchable music catalog.
pub trait CatalogProvider {
    /// Look up by an exact key such as `isrc:USUM71900001`.
    fn search_exact(&self, key: &str) -> ProviderResult<Vec<CatalogCandidate>>;

    /// Free-text search in the [`SearchQuery`] grammar, at most `limit` hits.
    fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<CatalogCandidate>>;
}

impl<P: CatalogProvider + ?Sized> CatalogProvider for &P {
    fn search_exact(&self, key: &str) -> ProviderResult<Vec<CatalogCandidate>> {
        (**self).search_exact(key)
    }

    fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<CatalogCandidate>> {
        (**self).search(query, limit)
    }
}

impl<P: CatalogProvider + ?Sized> CatalogProvider for Arc<P> {
    fn search_exact(&self, key: &str) -> ProviderResult<Vec<CatalogCandidate>> {
        (**self).search_exact(key)
    }

    fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<CatalogCandidate>> {
        (**self).search(query, limit)
    }
}

// ============================================================================
// Query Grammar
// ============================================================================

/// Field marker: `isrc:`, `id:`, `title:`, `artist:` at a word boundary.
static FIELD_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(isrc|id|title|artist):").unwrap());

/// Structured catalog query.
///
/// Rendered as `field:value` pairs separated by spaces; a value runs until
/// the next field marker. Text before the first marker is treated as a title.
/// Inside values `:` and `\` are backslash-escaped, so a title such as
/// "ID: Mission" can never open a new field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Isrc(String),
    Id(String),
    Text {
        title: Option<String>,
        artist: Option<String>,
    },
}

impl SearchQuery {
    pub fn isrc(value: &str) -> Self {
        Self::Isrc(value.trim().to_string())
    }

    pub fn title_artist(title: &str, artist: &str) -> Self {
        Self::Text {
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
        }
    }

    pub fn title_only(title: &str) -> Self {
        Self::Text {
            title: Some(title.to_string()),
            artist: None,
        }
    }

    /// Parse a rendered query. Unknown or empty input parses to an empty
    /// text query rather than failing.
    pub fn parse(raw: &str) -> Self {
        let mut isrc = None;
        let mut id = None;
        let mut title: Option<String> = None;
        let mut artist = None;

        let markers: Vec<_> = FIELD_MARKER.captures_iter(raw).collect();
        let leading_end = markers
            .first()
            .and_then(|c| c.get(0))
            .map_or(raw.len(), |m| m.start());
        let leading = raw[..leading_end].trim();
        if !leading.is_empty() {
            title = Some(unescape_value(leading));
        }

        for (i, caps) in markers.iter().enumerate() {
            let (Some(whole), Some(field)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value_end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(raw.len(), |m| m.start());
            let value = unescape_value(raw[whole.end()..value_end].trim());
            if value.is_empty() {
                continue;
            }
            match field.as_str().to_lowercase().as_str() {
                "isrc" => isrc = Some(value),
                "id" => id = Some(value),
                "title" => title = Some(value),
                _ => artist = Some(value),
            }
        }

        if let Some(code) = isrc {
            Self::Isrc(code)
        } else if let Some(id) = id {
            Self::Id(id)
        } else {
            Self::Text { title, artist }
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isrc(code) => write!(f, "isrc:{}", escape_value(code)),
            Self::Id(id) => write!(f, "id:{}", escape_value(id)),
            Self::Text { title, artist } => {
                let mut parts = Vec::new();
                if let Some(t) = title {
                    parts.push(format!("title:{}", escape_value(t)));
                }
                if let Some(a) = artist {
                    parts.push(format!("artist:{}", escape_value(a)));
                }
                write!(f, "{}", parts.join(" "))
            }
        }
    }
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ':' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unescape_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => unescaped.extend(chars.next()),
            _ => unescaped.push(c),
        }
    }
    unescaped
}
