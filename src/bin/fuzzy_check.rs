//! Check queries against a roster file and print the fuzzy match for each.
//! Usage: cargo run --release --bin fuzzy-check -- <roster> <query>...

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use catalog_match::index::DEFAULT_MIN_SCORE;
use catalog_match::matcher::FuzzyMatcher;
use catalog_match::normalize::normalize_key;
use catalog_match::roster::load_roster_file;

#[derive(Parser)]
#[command(name = "fuzzy-check")]
#[command(about = "Print the best roster match for each query")]
struct Args {
    /// Roster file, one entry per line
    roster: PathBuf,

    /// Queries to check; reads stdin lines when omitted
    queries: Vec<String>,

    /// Index floor below which no match is reported
    #[arg(long, default_value_t = DEFAULT_MIN_SCORE)]
    min_score: f64,

    /// Emit one JSON object per query
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let roster = load_roster_file(&args.roster)?;
    let matcher = FuzzyMatcher::with_min_score(roster, args.min_score);
    eprintln!("Indexed {} entries from {:?}", matcher.len(), args.roster);

    let queries = if args.queries.is_empty() {
        std::io::stdin()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read queries from stdin")?
    } else {
        args.queries
    };

    for query in &queries {
        let result = matcher.check(query);
        if args.json {
            println!("{}", serde_json::json!({ "query": query, "result": result }));
            continue;
        }
        println!(
            "{:<40} [{}] -> {} ({:.4}{})",
            query,
            normalize_key(query),
            result.matched_original.as_deref().unwrap_or("-"),
            result.score,
            if result.exact_token_hit { ", token hit" } else { "" }
        );
    }

    Ok(())
}
