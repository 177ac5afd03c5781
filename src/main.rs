use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use catalog_match::batch::{process_batch, read_records};
use catalog_match::classify::SignedClassifier;
use catalog_match::config::MatchConfig;
use catalog_match::progress::{create_spinner, format_duration, set_log_only};
use catalog_match::resolver::CatalogResolver;
use catalog_match::roster::load_roster_file;
use catalog_match::safety::ensure_distinct_output;
use catalog_match::sqlite_catalog::SqliteCatalog;

#[derive(Parser)]
#[command(name = "catalog-match")]
#[command(about = "Resolve noisy track records against a catalog dump and classify them as signed/unsigned")]
struct Args {
    /// Catalog SQLite dump
    catalog: PathBuf,

    /// Input records (JSON lines)
    input: PathBuf,

    /// Output results (JSON lines)
    output: PathBuf,

    /// Signed label roster, one label per line
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Signed artist roster, one artist per line
    #[arg(long)]
    artists: Option<PathBuf>,

    /// JSON file overriding match thresholds and limits
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Log every resolution decision
    #[arg(long, short)]
    verbose: bool,

    /// Write run statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn load_roster(path: Option<&Path>, kind: &str) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let roster = load_roster_file(path)?;
    info!("Loaded {} {} from {}", roster.len(), kind, path.display());
    Ok(roster)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let mut inputs: Vec<&Path> = vec![args.catalog.as_path(), args.input.as_path()];
    inputs.extend([&args.labels, &args.artists, &args.config].into_iter().flatten().map(PathBuf::as_path));
    ensure_distinct_output(&args.output, &inputs)?;
    if let Some(stats_path) = &args.stats {
        inputs.push(&args.output);
        ensure_distinct_output(stats_path, &inputs)?;
    }

    let start = Instant::now();

    let config = match &args.config {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };

    let labels = load_roster(args.labels.as_deref(), "labels")?;
    let artists = load_roster(args.artists.as_deref(), "artists")?;

    let spinner = create_spinner("Building roster indexes");
    let classifier = SignedClassifier::new(&labels, &artists, &config);
    spinner.finish_with_message(format!(
        "Indexed {} labels, {} artists",
        classifier.label_count(),
        classifier.artist_count()
    ));

    info!("Opening catalog: {:?}", args.catalog);
    let catalog = SqliteCatalog::open(&args.catalog)?;
    let track_count = catalog.track_count().context("Failed to read catalog")?;
    info!("Catalog has {} tracks", track_count);
    let resolver = CatalogResolver::with_config(catalog, config);

    let input = File::open(&args.input).with_context(|| format!("Failed to open records {}", args.input.display()))?;
    let records = read_records(BufReader::new(input))?;

    let output =
        File::create(&args.output).with_context(|| format!("Failed to create output {}", args.output.display()))?;
    let stats = process_batch(&records, &resolver, &classifier, output)?;

    stats.log_summary("batch");
    if let Some(path) = &args.stats {
        stats
            .write_to_file(path)
            .with_context(|| format!("Failed to write stats {}", path.display()))?;
        info!("Stats written to {:?}", path);
    }

    info!("Done in {}", format_duration(start.elapsed()));
    Ok(())
}
