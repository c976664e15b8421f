use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::categorize::categorize;
use crate::db::{Database, MalformedRow};
use crate::location::LocationInferrer;
use crate::models::{FeedbackEntry, Platform, RawRecord};
use crate::sentiment::{rating, score_for, SentimentScorer};

/// Anything shorter than this is treated as noise.
pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_REVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct PlatformReport {
    pub seen: usize,
    pub produced: usize,
    pub skipped_short: usize,
    pub malformed: usize,
    pub mark_failures: usize,
    /// Set when the whole pass for this platform aborted.
    pub failed: Option<String>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub platforms: Vec<(Platform, PlatformReport)>,
}

impl RunReport {
    pub fn produced(&self) -> usize {
        self.platforms.iter().map(|(_, r)| r.produced).sum()
    }

    pub fn failed_platforms(&self) -> Vec<Platform> {
        self.platforms
            .iter()
            .filter(|(_, r)| r.failed.is_some())
            .map(|(p, _)| *p)
            .collect()
    }
}

/// Turns unprocessed raw rows into feedback entries and consumes their
/// processed flags.
pub struct Normalizer<'a> {
    db: &'a Database,
    scorer: SentimentScorer,
    locations: LocationInferrer,
    dry_run: bool,
}

impl<'a> Normalizer<'a> {
    pub fn new(db: &'a Database, scorer: SentimentScorer, locations: LocationInferrer) -> Self {
        Self {
            db,
            scorer,
            locations,
            dry_run: false,
        }
    }

    /// Build entries without touching any processed flag.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// One pass over every platform, in order. A failing platform is logged
    /// and the remaining ones still run.
    pub fn run(&mut self) -> (Vec<FeedbackEntry>, RunReport) {
        let mut entries = Vec::new();
        let mut report = RunReport::default();

        for platform in Platform::ALL {
            info!(platform = %platform, "Processing platform");
            let mut platform_report = PlatformReport::default();
            match self.process_platform(platform, &mut platform_report) {
                Ok(mut produced) => {
                    info!(
                        platform = %platform,
                        produced = produced.len(),
                        skipped = platform_report.skipped_short,
                        malformed = platform_report.malformed,
                        "Platform done"
                    );
                    entries.append(&mut produced);
                }
                Err(e) => {
                    let msg = format!("{:#}", e);
                    error!(platform = %platform, error = %msg, "Platform pass failed");
                    platform_report.failed = Some(msg);
                }
            }
            report.platforms.push((platform, platform_report));
        }

        (entries, report)
    }

    pub fn process_platform(
        &mut self,
        platform: Platform,
        report: &mut PlatformReport,
    ) -> Result<Vec<FeedbackEntry>> {
        let rows = self.db.fetch_unprocessed(platform)?;
        let mut entries = Vec::new();

        for row in rows {
            report.seen += 1;
            let record = match row {
                Ok(record) => record,
                Err(bad) => {
                    report.malformed += 1;
                    warn!(platform = %platform, rowid = bad.rowid, id = ?bad.id, reason = %bad.reason, "Skipping malformed row");
                    self.mark_malformed(platform, &bad, report);
                    continue;
                }
            };

            match self.normalize(platform, &record) {
                Some(entry) => {
                    debug!(platform = %platform, id = %entry.id, category = %entry.category, "Built entry");
                    entries.push(entry);
                    report.produced += 1;
                }
                None => {
                    report.skipped_short += 1;
                    debug!(platform = %platform, id = %record.id, "Skipping short text");
                }
            }
            self.mark(platform, &record.id, report);
        }

        Ok(entries)
    }

    /// `None` for noise (missing or short text).
    pub fn normalize(&mut self, platform: Platform, record: &RawRecord) -> Option<FeedbackEntry> {
        let text = record.text.as_deref().unwrap_or("");
        if text.chars().count() < MIN_TEXT_CHARS {
            return None;
        }

        let sentiment = self.scorer.score(text);
        let rating = rating(sentiment.compound);
        let author = record.author.as_deref().unwrap_or("");
        let loc = self.locations.infer(text, author);

        Some(FeedbackEntry {
            id: format!("{}{}", platform.id_prefix(), record.id),
            customer_name: customer_name(record.author.as_deref()),
            location: format!("{}, {}", loc.city, state_code(&loc.state)),
            state: loc.state,
            county: loc.county,
            city: loc.city,
            rating,
            score: score_for(rating),
            review: text.chars().take(MAX_REVIEW_CHARS).collect(),
            date: entry_date(record.created_at.as_deref()),
            category: categorize(text).to_string(),
            verified: false,
            source: platform.source().to_string(),
        })
    }

    fn mark(&self, platform: Platform, id: &str, report: &mut PlatformReport) {
        if self.dry_run {
            return;
        }
        if let Err(e) = self.db.mark_processed(platform, id) {
            report.mark_failures += 1;
            let msg = format!("{:#}", e);
            error!(platform = %platform, id = %id, error = %msg, "Failed to mark processed");
        }
    }

    /// Malformed rows are consumed too, or they would be re-read every run.
    fn mark_malformed(&self, platform: Platform, bad: &MalformedRow, report: &mut PlatformReport) {
        if self.dry_run {
            return;
        }
        if let Err(e) = self.db.mark_processed_rowid(platform, bad.rowid) {
            report.mark_failures += 1;
            let msg = format!("{:#}", e);
            error!(platform = %platform, rowid = bad.rowid, error = %msg, "Failed to mark malformed row processed");
        }
    }
}

fn customer_name(author: Option<&str>) -> String {
    match author.map(str::trim) {
        Some(name) if !name.is_empty() => format!("{}.", name),
        _ => "User.".to_string(),
    }
}

/// First two letters of the state, upper-cased ("Ohio" -> "OH", "Texas" -> "TE").
fn state_code(state: &str) -> String {
    state.chars().take(2).collect::<String>().to_uppercase()
}

/// Date part of a raw timestamp, or today when there is none.
fn entry_date(created_at: Option<&str>) -> String {
    let date: String = created_at
        .and_then(|ts| ts.split('T').next())
        .map(|d| d.trim().chars().take(10).collect())
        .unwrap_or_default();
    if date.is_empty() {
        chrono::Local::now().format("%Y-%m-%d").to_string()
    } else {
        date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::KeywordAnalyzer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn normalizer(db: &Database) -> Normalizer<'_> {
        let scorer = SentimentScorer::new(Box::new(KeywordAnalyzer));
        let locations = LocationInferrer::with_rng(Box::new(StdRng::seed_from_u64(3))).unwrap();
        Normalizer::new(db, scorer, locations)
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn raw(id: &str, text: Option<&str>, author: Option<&str>, ts: Option<&str>) -> RawRecord {
        RawRecord {
            id: id.to_string(),
            text: text.map(String::from),
            author: author.map(String::from),
            created_at: ts.map(String::from),
        }
    }

    #[test]
    fn test_end_to_end_tweet() {
        let db = test_db();
        db.insert_raw(
            Platform::Twitter,
            &raw(
                "123",
                Some("T-Mobile coverage here in Ohio is excellent and fast"),
                Some("jdoe"),
                Some("2025-01-15T08:30:00.000Z"),
            ),
        )
        .unwrap();

        let (entries, report) = normalizer(&db).run();
        assert_eq!(entries.len(), 1);
        assert_eq!(report.produced(), 1);

        let e = &entries[0];
        assert_eq!(e.id, "twitter-123");
        assert_eq!(e.source, "Twitter");
        assert_eq!(e.category, "Coverage");
        assert_eq!(e.state, "Ohio");
        assert_eq!(e.location, "Ohio, OH");
        assert_eq!(e.county, "Ohio County");
        assert_eq!(e.customer_name, "jdoe.");
        assert_eq!(e.date, "2025-01-15");
        assert!(e.rating >= 4.0);
        assert_eq!(e.score, score_for(e.rating));
        assert!(!e.verified);
    }

    #[test]
    fn test_short_text_consumes_flag_without_entry() {
        let db = test_db();
        db.insert_raw(Platform::Instagram, &raw("a", Some("ok"), None, None)).unwrap();
        db.insert_raw(Platform::Instagram, &raw("b", Some(""), None, None)).unwrap();
        db.insert_raw(Platform::Instagram, &raw("c", None, None, None)).unwrap();

        let mut n = normalizer(&db);
        let mut report = PlatformReport::default();
        let entries = n.process_platform(Platform::Instagram, &mut report).unwrap();

        assert!(entries.is_empty());
        assert_eq!(report.seen, 3);
        assert_eq!(report.skipped_short, 3);
        assert_eq!(db.count_unprocessed(Platform::Instagram).unwrap(), 0);
    }

    #[test]
    fn test_second_run_produces_nothing() {
        let db = test_db();
        db.insert_raw(Platform::Twitter, &raw("1", Some("the network is down again"), Some("a"), None))
            .unwrap();
        db.insert_raw(
            Platform::FacebookPost,
            &raw("2", Some("Great support from the store today"), Some("Jane Roe"), None),
        )
        .unwrap();

        let (first, _) = normalizer(&db).run();
        assert_eq!(first.len(), 2);

        let (second, report) = normalizer(&db).run();
        assert!(second.is_empty());
        assert_eq!(report.produced(), 0);
    }

    #[test]
    fn test_dry_run_leaves_flags_alone() {
        let db = test_db();
        db.insert_raw(Platform::Twitter, &raw("1", Some("billing is a mess lately"), None, None))
            .unwrap();

        let (entries, _) = normalizer(&db).dry_run(true).run();
        assert_eq!(entries.len(), 1);
        assert_eq!(db.count_unprocessed(Platform::Twitter).unwrap(), 1);
    }

    #[test]
    fn test_facebook_ids_and_source() {
        let db = test_db();
        db.insert_raw(
            Platform::FacebookPost,
            &raw("p9", Some("Dead zone on my whole street"), Some("Ann Lee"), Some("2024-12-01T00:00:00+0000")),
        )
        .unwrap();
        db.insert_raw(
            Platform::FacebookComment,
            &raw("c9", Some("Same here, no service since Monday"), None, None),
        )
        .unwrap();

        let (entries, _) = normalizer(&db).run();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["facebook-post-p9", "facebook-comment-c9"]);
        assert!(entries.iter().all(|e| e.source == "Facebook"));
        assert_eq!(entries[0].customer_name, "Ann Lee.");
        assert_eq!(entries[0].date, "2024-12-01");
        assert_eq!(entries[1].customer_name, "User.");
    }

    #[test]
    fn test_missing_table_does_not_block_other_platforms() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        drop_table(&db, "instagram");
        db.insert_raw(Platform::FacebookComment, &raw("c1", Some("love the new unlimited plan"), None, None))
            .unwrap();

        let (entries, report) = normalizer(&db).run();
        assert_eq!(entries.len(), 1);
        assert_eq!(report.failed_platforms(), vec![Platform::Instagram]);
    }

    #[test]
    fn test_malformed_row_is_counted_and_consumed() {
        let db = test_db();
        db.insert_raw(Platform::Twitter, &raw("ok", Some("the signal is great downtown"), None, None))
            .unwrap();
        db.conn_for_tests()
            .execute("INSERT INTO twitter (id, text) VALUES ('bad', x'00ff')", [])
            .unwrap();

        let mut n = normalizer(&db);
        let mut report = PlatformReport::default();
        let entries = n.process_platform(Platform::Twitter, &mut report).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "twitter-ok");
        assert_eq!(report.seen, 2);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.mark_failures, 0);
        assert_eq!(db.count_unprocessed(Platform::Twitter).unwrap(), 0);
    }

    #[test]
    fn test_row_without_id_is_not_reported_twice() {
        let db = test_db();
        db.conn_for_tests()
            .execute("INSERT INTO twitter (id, text) VALUES (NULL, 'a tweet that lost its id')", [])
            .unwrap();

        let mut first = PlatformReport::default();
        normalizer(&db).process_platform(Platform::Twitter, &mut first).unwrap();
        assert_eq!(first.malformed, 1);
        assert_eq!(db.count_unprocessed(Platform::Twitter).unwrap(), 0);

        let mut second = PlatformReport::default();
        normalizer(&db).process_platform(Platform::Twitter, &mut second).unwrap();
        assert_eq!(second.seen, 0);
        assert_eq!(second.malformed, 0);
    }

    #[test]
    fn test_dry_run_leaves_malformed_rows_alone() {
        let db = test_db();
        db.conn_for_tests()
            .execute("INSERT INTO twitter (id, text) VALUES (NULL, 'a tweet that lost its id')", [])
            .unwrap();

        let mut report = PlatformReport::default();
        normalizer(&db)
            .dry_run(true)
            .process_platform(Platform::Twitter, &mut report)
            .unwrap();
        assert_eq!(report.malformed, 1);
        assert_eq!(db.count_unprocessed(Platform::Twitter).unwrap(), 1);
    }

    #[test]
    fn test_mark_failure_keeps_entry_and_counts() {
        let db = test_db();
        db.insert_raw(Platform::Twitter, &raw("1", Some("billing is a mess lately"), None, None))
            .unwrap();
        db.conn_for_tests()
            .execute("INSERT INTO twitter (id, text) VALUES (NULL, 'a tweet that lost its id')", [])
            .unwrap();
        db.conn_for_tests()
            .execute_batch(
                "CREATE TRIGGER twitter_readonly BEFORE UPDATE ON twitter \
                 BEGIN SELECT RAISE(ABORT, 'read only'); END;",
            )
            .unwrap();

        let mut report = PlatformReport::default();
        let entries = normalizer(&db)
            .process_platform(Platform::Twitter, &mut report)
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.mark_failures, 2);
        assert!(report.failed.is_none());
        assert_eq!(db.count_unprocessed(Platform::Twitter).unwrap(), 2);
    }

    fn drop_table(db: &Database, table: &str) {
        db.conn_for_tests()
            .execute_batch(&format!("DROP TABLE {}", table))
            .unwrap();
    }

    #[test]
    fn test_review_truncated_to_500_chars() {
        let db = test_db();
        let long: String = "é".repeat(700);
        let mut n = normalizer(&db);
        let entry = n
            .normalize(Platform::Twitter, &raw("long", Some(&long), None, None))
            .unwrap();
        assert_eq!(entry.review.chars().count(), MAX_REVIEW_CHARS);
    }

    #[test]
    fn test_entry_date_variants() {
        assert_eq!(entry_date(Some("2025-02-03T04:05:06Z")), "2025-02-03");
        assert_eq!(entry_date(Some("2025-02-03 04:05:06")), "2025-02-03");
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(entry_date(None), today);
        assert_eq!(entry_date(Some("")), today);
    }

    #[test]
    fn test_state_code_and_customer_name() {
        assert_eq!(state_code("Ohio"), "OH");
        assert_eq!(state_code("Texas"), "TE");
        assert_eq!(state_code("Unknown"), "UN");
        assert_eq!(customer_name(Some("jdoe")), "jdoe.");
        assert_eq!(customer_name(Some("  ")), "User.");
        assert_eq!(customer_name(None), "User.");
    }
}
