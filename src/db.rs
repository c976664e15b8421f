use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

use crate::models::{Platform, RawRecord};

/// Handle on the raw social store. One per invocation; the connection
/// closes when this is dropped.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

/// A row that could not be turned into a `RawRecord`. `rowid` is always
/// readable, so the row can be consumed even when its id is not.
#[derive(Debug, Clone)]
pub struct MalformedRow {
    pub rowid: i64,
    pub id: Option<String>,
    pub reason: String,
}

pub type RowOutcome = std::result::Result<RawRecord, MalformedRow>;

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> &Connection {
        &self.conn
    }

    /// Creates the raw tables the fetchers write into. Production stores
    /// already have them; this is for local runs and tests.
    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS twitter (
                id TEXT PRIMARY KEY,
                text TEXT,
                author_id TEXT,
                author_username TEXT,
                created_at TEXT,
                public_metrics TEXT,
                raw JSON,
                processed INTEGER DEFAULT 0,
                created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS instagram (
                id TEXT PRIMARY KEY,
                text TEXT,
                username TEXT,
                created_at TEXT,
                media_id TEXT,
                media_url TEXT,
                raw JSON,
                processed INTEGER DEFAULT 0,
                created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS facebook_posts (
                id TEXT PRIMARY KEY,
                message TEXT,
                created_time TEXT,
                from_name TEXT,
                from_id TEXT,
                comments_count INTEGER,
                likes_count INTEGER,
                raw JSON,
                processed INTEGER DEFAULT 0,
                created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS facebook_comments (
                id TEXT PRIMARY KEY,
                post_id TEXT,
                message TEXT,
                from_name TEXT,
                from_id TEXT,
                created_time TEXT,
                like_count INTEGER,
                raw JSON,
                processed INTEGER DEFAULT 0,
                created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_twitter_processed ON twitter(processed);
            CREATE INDEX IF NOT EXISTS idx_instagram_processed ON instagram(processed);
            CREATE INDEX IF NOT EXISTS idx_fb_posts_processed ON facebook_posts(processed);
            CREATE INDEX IF NOT EXISTS idx_fb_comments_processed ON facebook_comments(processed);
            "#,
        )?;
        Ok(())
    }

    // --- Raw record operations ---

    /// Every row of the platform's table that has not been processed yet,
    /// in no particular order. Rows that cannot be decoded come back as
    /// `Err(MalformedRow)` instead of failing the whole query.
    pub fn fetch_unprocessed(&self, platform: Platform) -> Result<Vec<RowOutcome>> {
        let sql = format!(
            "SELECT rowid, id, {}, {}, {} FROM {} WHERE processed = 0",
            platform.text_column(),
            platform.author_column(),
            platform.time_column(),
            platform.table()
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to query {}", platform.table()))?;
        let rows = stmt.query_map([], Self::row_to_outcome)?;

        rows.collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to read rows from {}", platform.table()))
    }

    /// Sets the processed flag for one record. Setting it twice is harmless.
    pub fn mark_processed(&self, platform: Platform, id: &str) -> Result<()> {
        let sql = format!("UPDATE {} SET processed = 1 WHERE id = ?1", platform.table());
        self.conn
            .execute(&sql, [id])
            .with_context(|| format!("Failed to mark {} {} processed", platform.table(), id))?;
        Ok(())
    }

    /// Same as `mark_processed`, addressed by SQLite rowid for rows whose id
    /// is missing or unreadable.
    pub fn mark_processed_rowid(&self, platform: Platform, rowid: i64) -> Result<()> {
        let sql = format!("UPDATE {} SET processed = 1 WHERE rowid = ?1", platform.table());
        self.conn.execute(&sql, [rowid]).with_context(|| {
            format!("Failed to mark {} rowid {} processed", platform.table(), rowid)
        })?;
        Ok(())
    }

    pub fn count_unprocessed(&self, platform: Platform) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE processed = 0", platform.table());
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Inserts a raw record unless its id already exists. Returns whether a
    /// row was written.
    pub fn insert_raw(&self, platform: Platform, record: &RawRecord) -> Result<bool> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (id, {}, {}, {}) VALUES (?1, ?2, ?3, ?4)",
            platform.table(),
            platform.text_column(),
            platform.author_column(),
            platform.time_column()
        );
        let changed = self.conn.execute(
            &sql,
            params![record.id, record.text, record.author, record.created_at],
        )?;
        Ok(changed > 0)
    }

    fn row_to_outcome(row: &rusqlite::Row) -> rusqlite::Result<RowOutcome> {
        let rowid: i64 = row.get(0)?;
        let id = match column_text(row.get_ref(1)?) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Ok(Err(MalformedRow {
                    rowid,
                    id: None,
                    reason: "missing id".to_string(),
                }))
            }
            Err(reason) => {
                return Ok(Err(MalformedRow {
                    rowid,
                    id: None,
                    reason,
                }))
            }
        };

        let mut fields = [None, None, None];
        for (i, slot) in fields.iter_mut().enumerate() {
            match column_text(row.get_ref(i + 2)?) {
                Ok(value) => *slot = value,
                Err(reason) => {
                    return Ok(Err(MalformedRow {
                        rowid,
                        id: Some(id),
                        reason,
                    }))
                }
            }
        }
        let [text, author, created_at] = fields;

        Ok(Ok(RawRecord {
            id,
            text,
            author,
            created_at,
        }))
    }
}

/// Lenient column read: numbers are stringified, blobs and invalid UTF-8
/// are rejected.
fn column_text(value: ValueRef<'_>) -> std::result::Result<Option<String>, String> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(i) => Ok(Some(i.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Some(s.to_string()))
            .map_err(|e| format!("invalid UTF-8: {}", e)),
        ValueRef::Blob(_) => Err("unexpected blob value".to_string()),
    }
}
