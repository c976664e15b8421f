use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::db::Database;
use crate::feed;
use crate::location::LocationInferrer;
use crate::models::FeedbackFeed;
use crate::normalize::{Normalizer, RunReport};
use crate::sentiment::SentimentScorer;

pub struct ProcessOutcome {
    pub report: RunReport,
    pub new_entries: usize,
    /// `None` on a dry run.
    pub feed: Option<FeedbackFeed>,
}

/// Normalizes every platform once, then merges the new entries into the
/// feed at `output`. Platform failures are reported, not returned; only a
/// failed feed write is an error.
pub fn run_processing(
    db: &Database,
    scorer: SentimentScorer,
    locations: LocationInferrer,
    output: &Path,
    dry_run: bool,
) -> Result<ProcessOutcome> {
    info!(analyzer = scorer.analyzer_name(), dry_run, "Processing social media data");

    let mut normalizer = Normalizer::new(db, scorer, locations).dry_run(dry_run);
    let (entries, report) = normalizer.run();

    for platform in report.failed_platforms() {
        warn!(platform = %platform, "Platform skipped this run");
    }
    info!(produced = report.produced(), "Normalization finished");

    let feed = if dry_run {
        None
    } else {
        Some(feed::merge_and_write(output, &entries)?)
    };

    Ok(ProcessOutcome {
        report,
        new_entries: entries.len(),
        feed,
    })
}
