use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::{FeedbackEntry, FeedbackFeed};

/// Entries from the feed currently on disk. Accepts either a bare array or
/// an object with an `entries` array. Anything unreadable counts as empty.
pub fn load_existing(path: &Path) -> Vec<Value> {
    if !path.exists() {
        return Vec::new();
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read existing feed, starting empty");
            return Vec::new();
        }
    };

    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Existing feed is not valid JSON, starting empty");
            return Vec::new();
        }
    };

    let entries = match parsed {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("entries") {
            Some(Value::Array(items)) => items,
            _ => {
                warn!(path = %path.display(), "Existing feed has no entries array, starting empty");
                return Vec::new();
            }
        },
        _ => {
            warn!(path = %path.display(), "Existing feed has an unexpected shape, starting empty");
            return Vec::new();
        }
    };

    let total = entries.len();
    let kept: Vec<Value> = entries.into_iter().filter(|e| entry_key(e).is_some()).collect();
    if kept.len() < total {
        warn!(dropped = total - kept.len(), "Dropped existing entries without an id");
    }
    kept
}

/// Dedup key for an entry: any non-null `id`. String ids and other JSON ids
/// never collide, so `"1"` and `1` stay distinct.
pub fn entry_key(entry: &Value) -> Option<(bool, String)> {
    match entry.get("id")? {
        Value::Null => None,
        Value::String(id) => Some((true, id.clone())),
        other => Some((false, other.to_string())),
    }
}

/// Existing entries first, then new ones; the first entry seen for an id
/// wins and order is otherwise preserved.
pub fn merge_entries(existing: Vec<Value>, new_entries: &[FeedbackEntry]) -> Result<Vec<Value>> {
    let mut incoming = Vec::with_capacity(new_entries.len());
    for entry in new_entries {
        incoming.push(serde_json::to_value(entry).context("Failed to encode feedback entry")?);
    }

    let mut seen: HashSet<(bool, String)> = HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + incoming.len());

    for entry in existing.into_iter().chain(incoming) {
        let Some(key) = entry_key(&entry) else {
            continue;
        };
        if seen.insert(key) {
            merged.push(entry);
        }
    }

    Ok(merged)
}

pub fn build_feed(entries: Vec<Value>) -> FeedbackFeed {
    FeedbackFeed {
        success: true,
        total: entries.len(),
        entries,
        last_updated: chrono::Local::now().to_rfc3339(),
    }
}

/// Replaces the feed at `path` via a sibling temp file and a rename, so a
/// reader never sees a half-written file.
pub fn write_feed(path: &Path, feed: &FeedbackFeed) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let body = serde_json::to_vec_pretty(feed).context("Failed to encode feed")?;
    let tmp_path = temp_path(path);
    fs::write(&tmp_path, body)
        .with_context(|| format!("Failed to write temp feed {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace feed {}", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn merge_and_write(path: &Path, new_entries: &[FeedbackEntry]) -> Result<FeedbackFeed> {
    let existing = load_existing(path);
    let existing_count = existing.len();
    let merged = merge_entries(existing, new_entries)?;
    let feed = build_feed(merged);
    write_feed(path, &feed)?;
    info!(
        path = %path.display(),
        existing = existing_count,
        new = new_entries.len(),
        total = feed.total,
        "Wrote feedback feed"
    );
    Ok(feed)
}

// --- Summary ---

#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedSummary {
    pub total: usize,
    pub average_rating: f64,
    pub by_source: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

pub fn summarize(entries: &[Value]) -> FeedSummary {
    let mut summary = FeedSummary {
        total: entries.len(),
        ..Default::default()
    };

    let mut rating_sum = 0.0;
    let mut rated = 0usize;
    for entry in entries {
        if let Some(r) = entry.get("rating").and_then(Value::as_f64) {
            rating_sum += r;
            rated += 1;
        }
        let source = entry.get("source").and_then(Value::as_str).unwrap_or("Unknown");
        *summary.by_source.entry(source.to_string()).or_default() += 1;
        let category = entry.get("category").and_then(Value::as_str).unwrap_or("Other");
        *summary.by_category.entry(category.to_string()).or_default() += 1;
    }

    if rated > 0 {
        summary.average_rating = ((rating_sum / rated as f64) * 10.0).round() / 10.0;
    }
    summary
}
