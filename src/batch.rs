//! Batch resolution and classification over JSON-lines records.
//!
//! Records are resolved chunk by chunk: each chunk fans out over the rayon
//! pool and is collected in input order, then handed through a bounded
//! channel to a single writer thread that keeps the statistics. At most a few
//! chunks of results are held in memory at once. A provider error fails only
//! its own record.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::classify::SignedClassifier;
use crate::models::{
    CatalogEntity, ClassificationSignal, ResolutionAttempt, ResolutionInput, ResolutionOutcome, ResolutionStats,
};
use crate::progress::{create_progress_bar, format_duration, log_interval, log_progress};
use crate::provider::CatalogProvider;
use crate::resolver::CatalogResolver;

/// Records resolved in parallel before their results are handed to the writer
pub const CHUNK_SIZE: usize = 4096;

/// Finished chunks buffered between workers and the writer
const CHANNEL_CAPACITY: usize = 2;

// ============================================================================
// Records
// ============================================================================

/// One input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub already_signed: bool,
}

impl BatchRecord {
    pub fn to_input(&self) -> ResolutionInput {
        ResolutionInput::new(self.isrc.as_deref(), self.title.as_deref(), &self.artist)
    }
}

/// One output line.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub row: usize,
    pub input: BatchRecord,
    pub attempt: ResolutionAttempt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<CatalogEntity>,
    pub signed: bool,
    pub signal: ClassificationSignal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse JSON-lines records, skipping blank lines.
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<BatchRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: BatchRecord =
            serde_json::from_str(&line).with_context(|| format!("Invalid record on line {}", i + 1))?;
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// Processing
// ============================================================================

/// Resolve then classify one record. Provider errors are kept on the result.
pub fn process_record<P: CatalogProvider>(
    row: usize,
    record: &BatchRecord,
    resolver: &CatalogResolver<P>,
    classifier: &SignedClassifier,
) -> BatchResult {
    let (outcome, error) = match resolver.resolve(&record.to_input()) {
        Ok(outcome) => (outcome, None),
        Err(e) => {
            warn!("row {}: {}", row, e);
            (ResolutionOutcome::Unresolved, Some(e.to_string()))
        }
    };

    let attempt = outcome.attempt();
    let confidence = outcome.confidence();
    let entity = match outcome {
        ResolutionOutcome::Resolved { entity, .. } => Some(entity),
        ResolutionOutcome::Unresolved => None,
    };

    // Catalog label wins over the record's own; same for the artist credit
    let label = entity
        .as_ref()
        .and_then(|e| e.label.as_deref())
        .or(record.label.as_deref());
    let artist = entity
        .as_ref()
        .map(CatalogEntity::artist_string)
        .unwrap_or_else(|| record.artist.clone());
    let (signed, signal) = classifier.classify(label, &artist, record.already_signed);

    BatchResult {
        row,
        input: record.clone(),
        attempt,
        confidence,
        entity,
        signed,
        signal,
        error,
    }
}

/// Process all records in parallel and write results to `writer` in input
/// order, one JSON object per line.
pub fn process_batch<P, W>(
    records: &[BatchRecord],
    resolver: &CatalogResolver<P>,
    classifier: &SignedClassifier,
    writer: W,
) -> Result<ResolutionStats>
where
    P: CatalogProvider + Sync,
    W: Write + Send,
{
    process_batch_chunked(records, resolver, classifier, writer, CHUNK_SIZE)
}

/// [`process_batch`] with an explicit chunk size.
pub fn process_batch_chunked<P, W>(
    records: &[BatchRecord],
    resolver: &CatalogResolver<P>,
    classifier: &SignedClassifier,
    writer: W,
    chunk_size: usize,
) -> Result<ResolutionStats>
where
    P: CatalogProvider + Sync,
    W: Write + Send,
{
    let start = Instant::now();
    let total = records.len() as u64;
    let chunk_size = chunk_size.max(1);
    info!("Resolving {} records in chunks of {}", total, chunk_size);

    let pb = create_progress_bar(total, "Resolving records");
    let interval = log_interval(total);
    let done = AtomicU64::new(0);
    let (tx, rx) = bounded::<Vec<BatchResult>>(CHANNEL_CAPACITY);

    let mut stats = std::thread::scope(|scope| {
        let writer_handle = scope.spawn(move || write_results(rx, writer));

        for (chunk_idx, chunk) in records.chunks(chunk_size).enumerate() {
            let offset = chunk_idx * chunk_size;
            let results: Vec<BatchResult> = chunk
                .par_iter()
                .enumerate()
                .map(|(i, record)| {
                    let result = process_record(offset + i, record, resolver, classifier);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    pb.inc(1);
                    log_progress("resolve", n, total, interval);
                    result
                })
                .collect();

            // A closed channel means the writer failed; its error surfaces on join
            if tx.send(results).is_err() {
                warn!("Result writer stopped early, abandoning remaining records");
                break;
            }
        }
        drop(tx);

        writer_handle
            .join()
            .map_err(|_| anyhow!("Result writer thread panicked"))?
    })?;

    stats.total_records = records.len();
    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    pb.finish_with_message(format!(
        "Resolved {}/{} records in {}",
        stats.resolved(),
        stats.total_records,
        format_duration(start.elapsed())
    ));
    info!(
        "Resolved {}/{} ({:.1}%), {} provider errors",
        stats.resolved(),
        stats.total_records,
        stats.resolution_rate(),
        stats.provider_errors
    );
    Ok(stats)
}

/// Drain result chunks, writing them in row order and tallying statistics.
fn write_results<W: Write>(rx: Receiver<Vec<BatchResult>>, writer: W) -> Result<ResolutionStats> {
    let mut out = BufWriter::new(writer);
    let mut stats = ResolutionStats::default();

    for chunk in rx {
        for result in &chunk {
            if result.error.is_some() {
                stats.provider_errors += 1;
            } else {
                stats.record_attempt(result.attempt);
            }
            stats.record_classification(result.signed, result.signal);
            serde_json::to_writer(&mut out, result).context("Failed to serialize result")?;
            out.write_all(b"\n").context("Failed to write result")?;
        }
    }
    out.flush().context("Failed to flush results")?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::models::CatalogCandidate;
    use crate::provider::{ProviderError, ProviderResult};

    struct FakeCatalog;

    impl CatalogProvider for FakeCatalog {
        fn search_exact(&self, key: &str) -> ProviderResult<Vec<CatalogCandidate>> {
            match key {
                "isrc:US-OK" => {
                    let mut c = CatalogCandidate::new("ok-1", "Song", vec!["Someone".into()]);
                    c.label = Some("Columbia Records".into());
                    Ok(vec![c])
                }
                "isrc:US-FAIL" => Err(ProviderError::Unavailable("catalog down".into())),
                _ => Ok(Vec::new()),
            }
        }

        fn search(&self, _query: &str, _limit: usize) -> ProviderResult<Vec<CatalogCandidate>> {
            Ok(Vec::new())
        }
    }

    fn record(isrc: Option<&str>, title: Option<&str>, artist: &str, label: Option<&str>) -> BatchRecord {
        BatchRecord {
            title: title.map(str::to_string),
            artist: artist.to_string(),
            isrc: isrc.map(str::to_string),
            label: label.map(str::to_string),
            already_signed: false,
        }
    }

    fn classifier() -> SignedClassifier {
        SignedClassifier::new(
            &["Columbia".to_string(), "RCA".to_string()],
            &["Drake".to_string()],
            &MatchConfig::default(),
        )
    }

    #[test]
    fn test_read_records() {
        let input = "{\"title\": \"Song\", \"artist\": \"A\", \"isrc\": \"US1\"}\n\n{\"artist\": \"B\", \"already_signed\": true}\n";
        let records = read_records(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].isrc.as_deref(), Some("US1"));
        assert!(records[1].already_signed);
        assert!(records[1].title.is_none());
    }

    #[test]
    fn test_read_records_reports_line() {
        let input = "{\"artist\": \"A\"}\n{\"title\": \"no artist\"}\n";
        let err = read_records(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_process_record_prefers_entity_label() {
        let resolver = CatalogResolver::new(FakeCatalog);
        let rec = record(Some("US-OK"), Some("Song"), "Someone", Some("Indie"));
        let result = process_record(0, &rec, &resolver, &classifier());
        assert_eq!(result.attempt, ResolutionAttempt::ExactKey);
        assert_eq!(result.confidence, Some(1.0));
        assert_eq!((result.signed, result.signal), (true, ClassificationSignal::LabelExactSubstring));
    }

    #[test]
    fn test_process_batch() {
        let mut signed = record(None, None, "Whoever", None);
        signed.already_signed = true;
        let records = vec![
            record(Some("US-OK"), Some("Song"), "Someone", None),
            record(Some("US-FAIL"), Some("Song"), "Whoever", None),
            record(None, Some("Nothing"), "Drake", None),
            record(None, None, "Nobody", Some("RCA Records")),
            signed,
        ];
        let resolver = CatalogResolver::new(FakeCatalog);

        let mut out = Vec::new();
        let stats = process_batch(&records, &resolver, &classifier(), &mut out).unwrap();

        assert_eq!(stats.total_records, 5);
        assert_eq!(stats.exact_key, 1);
        assert_eq!(stats.unresolved, 3);
        assert_eq!(stats.provider_errors, 1);
        assert_eq!(stats.signed_label_substring, 2);
        assert_eq!(stats.signed_artist_roster, 1);
        assert_eq!(stats.already_signed, 1);
        assert_eq!(stats.not_signed, 1);

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["row"], i);
        }
        assert_eq!(lines[0]["attempt"], "exact_key");
        assert_eq!(lines[0]["entity"]["id"], "ok-1");
        assert!(lines[1]["error"].as_str().unwrap().contains("catalog down"));
        assert!(lines[1].get("entity").is_none());
        assert_eq!(lines[2]["signal"], "artist_roster_fuzzy");
        assert_eq!(lines[3]["signal"], "label_exact_substring");
        assert_eq!(lines[4]["signed"], true);
        assert_eq!(lines[4]["signal"], "none");
    }

    #[test]
    fn test_process_batch_small_chunks_keep_order() {
        let records: Vec<BatchRecord> = (0..7)
            .map(|i| record(None, Some("Nothing"), &format!("Artist {}", i), None))
            .collect();
        let resolver = CatalogResolver::new(FakeCatalog);

        let mut out = Vec::new();
        let stats = process_batch_chunked(&records, &resolver, &classifier(), &mut out, 2).unwrap();
        assert_eq!(stats.total_records, 7);

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 7);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line["row"], i);
            assert_eq!(line["input"]["artist"], format!("Artist {}", i));
        }
    }

    #[test]
    fn test_process_batch_empty() {
        let resolver = CatalogResolver::new(FakeCatalog);
        let mut out = Vec::new();
        let stats = process_batch(&[], &resolver, &classifier(), &mut out).unwrap();
        assert_eq!(stats.total_records, 0);
        assert!(out.is_empty());
    }
}
