mod categorize;
mod config;
mod db;
mod feed;
mod location;
mod models;
mod normalize;
mod pipeline;
mod sentiment;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use location::LocationInferrer;
use models::{Platform, RawRecord};
use sentiment::SentimentScorer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "social-feedback")]
#[command(about = "Turn raw social media mentions into a rated, categorized feedback feed")]
struct Cli {
    /// Path to the raw social database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path of the JSON feed to write
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the raw platform tables if they are missing
    Init,

    /// Process unprocessed records and merge them into the feed
    Process {
        /// Build entries without marking records or writing the feed
        #[arg(long)]
        dry_run: bool,
    },

    /// Show unprocessed record counts per platform
    Status,

    /// Summarize the current feed
    Stats,

    /// Load raw records from a JSON file into a platform table
    Import {
        /// twitter, instagram, facebook-post or facebook-comment
        platform: String,

        /// JSON array of {id, text, author, created_at}
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("social_feedback=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.db, cli.output)?;

    match cli.command {
        Commands::Init => {
            let db = Database::open(&config.db_path)?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Process { dry_run } => {
            let db = Database::open(&config.db_path)?;
            let scorer = SentimentScorer::default();
            let locations = LocationInferrer::new()?;
            let outcome =
                pipeline::run_processing(&db, scorer, locations, &config.output_path, dry_run)?;

            println!(
                "{:<20} {:>6} {:>8} {:>8} {:>9}  {}",
                "PLATFORM", "SEEN", "ENTRIES", "SKIPPED", "MALFORMED", "STATUS"
            );
            println!("{}", "-".repeat(70));
            for (platform, report) in &outcome.report.platforms {
                let status = match &report.failed {
                    Some(reason) => format!("failed: {}", truncate(reason, 40)),
                    None if report.mark_failures > 0 => {
                        format!("ok ({} not marked)", report.mark_failures)
                    }
                    None => "ok".to_string(),
                };
                println!(
                    "{:<20} {:>6} {:>8} {:>8} {:>9}  {}",
                    platform.table(),
                    report.seen,
                    report.produced,
                    report.skipped_short,
                    report.malformed,
                    status
                );
            }

            match &outcome.feed {
                Some(feed) => println!(
                    "\n{} new entries, {} total in {}",
                    outcome.new_entries,
                    feed.total,
                    config.output_path.display()
                ),
                None => println!(
                    "\n(Dry run - {} entries built, nothing written)",
                    outcome.new_entries
                ),
            }
        }

        Commands::Status => {
            let db = Database::open(&config.db_path)?;
            println!("{:<20} {:>12}", "TABLE", "UNPROCESSED");
            println!("{}", "-".repeat(33));
            for platform in Platform::ALL {
                match db.count_unprocessed(platform) {
                    Ok(count) => println!("{:<20} {:>12}", platform.table(), count),
                    Err(_) => println!("{:<20} {:>12}", platform.table(), "missing"),
                }
            }
        }

        Commands::Stats => {
            let entries = feed::load_existing(&config.output_path);
            if entries.is_empty() {
                println!("No feedback entries in {}.", config.output_path.display());
                return Ok(());
            }
            let summary = feed::summarize(&entries);
            println!("Entries:        {}", summary.total);
            println!("Average rating: {:.1}", summary.average_rating);
            println!("\nBy source:");
            for (source, count) in &summary.by_source {
                println!("  {:<20} {:>6}", truncate(source, 20), count);
            }
            println!("\nBy category:");
            for (category, count) in &summary.by_category {
                println!("  {:<20} {:>6}", truncate(category, 20), count);
            }
        }

        Commands::Import { platform, file } => {
            let platform = Platform::from_name(&platform)
                .ok_or_else(|| anyhow!("Unknown platform '{}'", platform))?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<RawRecord> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            let db = Database::open(&config.db_path)?;
            let mut inserted = 0;
            for record in &records {
                if db.insert_raw(platform, record)? {
                    inserted += 1;
                }
            }
            info!(platform = %platform, inserted, total = records.len(), "Imported raw records");
            println!(
                "Imported {} of {} records into {}",
                inserted,
                records.len(),
                platform.table()
            );
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
