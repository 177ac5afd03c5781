//! SQLite-backed catalog provider.
//!
//! Reads a streaming-catalog dump with the layout:
//!
//! ```text
//! tracks(rowid, id, name, popularity, external_id_isrc, album_rowid)
//! albums(rowid, name, label)
//! artists(rowid, name)
//! track_artists(track_rowid, artist_rowid)   -- rowid order = credit order
//! ```
//!
//! Free-text search is word-wise `LIKE` matching, most popular first. It is
//! meant for dumps that fit the page cache, not as a search engine.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::CatalogCandidate;
use crate::provider::{CatalogProvider, ProviderError, ProviderResult, SearchQuery};

const TRACK_SELECT: &str = "SELECT t.rowid, t.id, t.name, t.popularity, t.external_id_isrc, a.name, a.label
     FROM tracks t
     LEFT JOIN albums a ON a.rowid = t.album_rowid";

const ARTIST_WORD_CLAUSE: &str = "EXISTS (SELECT 1 FROM track_artists ta
         JOIN artists ar ON ar.rowid = ta.artist_rowid
         WHERE ta.track_rowid = t.rowid AND LOWER(ar.name) LIKE ? ESCAPE '\\')";

const CREDITS_SELECT: &str = "SELECT ar.name FROM track_artists ta
     JOIN artists ar ON ar.rowid = ta.artist_rowid
     WHERE ta.track_rowid = ?1
     ORDER BY ta.rowid";

/// Catalog over a local SQLite dump. The connection is shared behind a mutex,
/// so parallel resolvers serialize on it.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open a catalog dump read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open catalog {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA mmap_size = 1073741824;
             PRAGMA cache_size = -200000;
             PRAGMA temp_store = MEMORY;",
        )
        .context("Failed to configure catalog connection")?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    pub fn track_count(&self) -> ProviderResult<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?)
    }

    fn lock(&self) -> ProviderResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ProviderError::Unavailable("catalog connection poisoned".into()))
    }
}

impl CatalogProvider for SqliteCatalog {
    fn search_exact(&self, key: &str) -> ProviderResult<Vec<CatalogCandidate>> {
        let (column, value) = match SearchQuery::parse(key) {
            SearchQuery::Isrc(code) => ("t.external_id_isrc", code),
            SearchQuery::Id(id) => ("t.id", id),
            SearchQuery::Text { .. } => {
                return Err(ProviderError::Malformed(format!("not an exact key: {:?}", key)));
            }
        };

        let conn = self.lock()?;
        let sql = format!("{} WHERE {} = ? ORDER BY t.popularity DESC, t.rowid", TRACK_SELECT, column);
        query_candidates(&conn, &sql, &[&value as &dyn ToSql])
    }

    fn search(&self, query: &str, limit: usize) -> ProviderResult<Vec<CatalogCandidate>> {
        let (title, artist) = match SearchQuery::parse(query) {
            SearchQuery::Text { title, artist } => (title, artist),
            // Exact keys are valid queries too
            SearchQuery::Isrc(_) | SearchQuery::Id(_) => {
                let mut hits = self.search_exact(query)?;
                hits.truncate(limit);
                return Ok(hits);
            }
        };

        let mut clauses = Vec::new();
        let mut patterns = Vec::new();
        for word in words(title.as_deref()) {
            clauses.push("LOWER(t.name) LIKE ? ESCAPE '\\'");
            patterns.push(like_pattern(&word));
        }
        for word in words(artist.as_deref()) {
            clauses.push(ARTIST_WORD_CLAUSE);
            patterns.push(like_pattern(&word));
        }
        if clauses.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE {} ORDER BY t.popularity DESC, t.rowid LIMIT ?",
            TRACK_SELECT,
            clauses.join(" AND ")
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut params: Vec<&dyn ToSql> = patterns.iter().map(|s| s as &dyn ToSql).collect();
        params.push(&limit);

        let conn = self.lock()?;
        query_candidates(&conn, &sql, &params)
    }
}

fn words(field: Option<&str>) -> Vec<String> {
    field
        .map(|f| f.split_whitespace().map(str::to_lowercase).collect())
        .unwrap_or_default()
}

/// `%word%` with LIKE metacharacters escaped.
fn like_pattern(word: &str) -> String {
    let mut pattern = String::with_capacity(word.len() + 2);
    pattern.push('%');
    for c in word.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn query_candidates(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> ProviderResult<Vec<CatalogCandidate>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut credits = conn.prepare_cached(CREDITS_SELECT)?;

    let mut candidates = Vec::new();
    while let Some(row) = rows.next()? {
        let rowid: i64 = row.get(0)?;
        let artist_names = credits
            .query_map([rowid], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        candidates.push(CatalogCandidate {
            id: row.get(1)?,
            title: row.get(2)?,
            popularity: row.get(3)?,
            isrc: row.get(4)?,
            album: row.get(5)?,
            label: row.get(6)?,
            artist_names,
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResolutionAttempt, ResolutionInput};
    use crate::resolver::CatalogResolver;

    fn fixture() -> SqliteCatalog {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE albums (rowid INTEGER PRIMARY KEY, name TEXT, label TEXT);
             CREATE TABLE artists (rowid INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE tracks (
                 rowid INTEGER PRIMARY KEY,
                 id TEXT NOT NULL,
                 name TEXT NOT NULL,
                 popularity INTEGER,
                 external_id_isrc TEXT,
                 album_rowid INTEGER
             );
             CREATE TABLE track_artists (track_rowid INTEGER NOT NULL, artist_rowid INTEGER NOT NULL);

             INSERT INTO albums VALUES (1, 'After Hours', 'Republic Records');
             INSERT INTO albums VALUES (2, 'Views', 'Cash Money');
             INSERT INTO albums VALUES (3, 'Tribute Covers', NULL);

             INSERT INTO artists VALUES (1, 'The Weeknd');
             INSERT INTO artists VALUES (2, 'Drake');
             INSERT INTO artists VALUES (3, 'Rihanna');
             INSERT INTO artists VALUES (4, 'Cover Band');
             INSERT INTO artists VALUES (5, 'Some Band');

             INSERT INTO tracks VALUES (1, 'bl-1', 'Blinding Lights', 95, 'USUG11904206', 1);
             INSERT INTO tracks VALUES (2, 'hb-1', 'Hotline Bling', 88, 'USCM51500238', 2);
             INSERT INTO tracks VALUES (3, 'hb-2', 'Hotline Bling', 12, NULL, 3);
             INSERT INTO tracks VALUES (4, 'tw-1', 'Too Good', 70, 'USCM51600099', 2);
             INSERT INTO tracks VALUES (5, 'pct', '100% Pure', 5, NULL, NULL);
             INSERT INTO tracks VALUES (6, 'idm-1', 'ID: Mission', 40, NULL, NULL);

             INSERT INTO track_artists VALUES (1, 1);
             INSERT INTO track_artists VALUES (2, 2);
             INSERT INTO track_artists VALUES (3, 4);
             INSERT INTO track_artists VALUES (4, 2);
             INSERT INTO track_artists VALUES (4, 3);
             INSERT INTO track_artists VALUES (5, 4);
             INSERT INTO track_artists VALUES (6, 5);",
        )
        .unwrap();
        SqliteCatalog::from_connection(conn)
    }

    #[test]
    fn test_exact_isrc() {
        let catalog = fixture();
        let hits = catalog.search_exact("isrc:USUG11904206").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "bl-1");
        assert_eq!(hits[0].artist_names, vec!["The Weeknd"]);
        assert_eq!(hits[0].label.as_deref(), Some("Republic Records"));
        assert_eq!(hits[0].album.as_deref(), Some("After Hours"));
        assert_eq!(hits[0].popularity, Some(95));
    }

    #[test]
    fn test_exact_id_and_miss() {
        let catalog = fixture();
        assert_eq!(catalog.search_exact("id:hb-2").unwrap()[0].title, "Hotline Bling");
        assert!(catalog.search_exact("isrc:XX0000000000").unwrap().is_empty());
    }

    #[test]
    fn test_exact_rejects_free_text() {
        let catalog = fixture();
        let err = catalog.search_exact("title:Hotline Bling").unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[test]
    fn test_search_title_artist() {
        let catalog = fixture();
        let hits = catalog.search("title:hotline bling artist:drake", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "hb-1");
    }

    #[test]
    fn test_search_title_only_by_popularity() {
        let catalog = fixture();
        let hits = catalog.search("title:Hotline Bling", 20).unwrap();
        let ids: Vec<_> = hits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["hb-1", "hb-2"]);
        assert_eq!(hits[1].label, None);

        let limited = catalog.search("title:Hotline Bling", 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_search_credit_order() {
        let catalog = fixture();
        let hits = catalog.search("title:too good artist:rihanna", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].artist_names, vec!["Drake", "Rihanna"]);
        assert_eq!(hits[0].artist_string(), "Drake Rihanna");
    }

    #[test]
    fn test_search_escapes_like_wildcards() {
        let catalog = fixture();
        assert_eq!(catalog.search("title:100%", 10).unwrap().len(), 1);
        assert!(catalog.search("title:_ood", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_empty_query() {
        let catalog = fixture();
        assert!(catalog.search("", 10).unwrap().is_empty());
        assert!(catalog.search("title:Hotline", 0).unwrap().is_empty());
    }

    #[test]
    fn test_track_count() {
        assert_eq!(fixture().track_count().unwrap(), 6);
    }

    #[test]
    fn test_search_title_with_field_marker() {
        let catalog = fixture();
        let query = SearchQuery::title_artist("ID: Mission", "Some Band").to_string();
        let hits = catalog.search(&query, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "idm-1");
    }

    #[test]
    fn test_resolve_title_with_field_marker() {
        let resolver = CatalogResolver::new(fixture());
        let input = ResolutionInput::new(None, Some("ID: Mission"), "Some Band");
        let outcome = resolver.resolve(&input).unwrap();
        assert_eq!(outcome.attempt(), ResolutionAttempt::FuzzyTitleArtist);
        assert_eq!(outcome.entity().map(|e| e.id.as_str()), Some("idm-1"));
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("a_b%c"), "%a\\_b\\%c%");
    }
}
