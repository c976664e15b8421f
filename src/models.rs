use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw tables the fetchers write into. SQL is only ever built from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Twitter,
    Instagram,
    FacebookPost,
    FacebookComment,
}

impl Platform {
    /// Processing order for a full run.
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Instagram,
        Platform::FacebookPost,
        Platform::FacebookComment,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::FacebookPost => "facebook_posts",
            Platform::FacebookComment => "facebook_comments",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter-",
            Platform::Instagram => "instagram-",
            Platform::FacebookPost => "facebook-post-",
            Platform::FacebookComment => "facebook-comment-",
        }
    }

    /// Value written to `FeedbackEntry::source`.
    pub fn source(self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::Instagram => "Instagram",
            Platform::FacebookPost | Platform::FacebookComment => "Facebook",
        }
    }

    pub fn text_column(self) -> &'static str {
        match self {
            Platform::Twitter | Platform::Instagram => "text",
            Platform::FacebookPost | Platform::FacebookComment => "message",
        }
    }

    pub fn author_column(self) -> &'static str {
        match self {
            Platform::Twitter => "author_username",
            Platform::Instagram => "username",
            Platform::FacebookPost | Platform::FacebookComment => "from_name",
        }
    }

    pub fn time_column(self) -> &'static str {
        match self {
            Platform::Twitter | Platform::Instagram => "created_at",
            Platform::FacebookPost | Platform::FacebookComment => "created_time",
        }
    }

    pub fn from_name(name: &str) -> Option<Platform> {
        match name.to_lowercase().as_str() {
            "twitter" | "x" => Some(Platform::Twitter),
            "instagram" => Some(Platform::Instagram),
            "facebook-post" | "facebook_posts" | "facebook-posts" => Some(Platform::FacebookPost),
            "facebook-comment" | "facebook_comments" | "facebook-comments" => {
                Some(Platform::FacebookComment)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// One unprocessed row from a platform table, with the platform-specific
/// column names already mapped onto common fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub text: Option<String>,
    pub author: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub id: String,
    pub customer_name: String,
    pub location: String,
    pub state: String,
    pub county: String,
    pub city: String,
    pub rating: f64,
    pub score: i64,
    pub review: String,
    pub date: String,
    pub category: String,
    pub verified: bool,
    pub source: String,
}

/// The persisted feed. Entries stay as raw JSON objects so anything another
/// tool wrote into the file survives a rewrite untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackFeed {
    pub success: bool,
    pub entries: Vec<serde_json::Value>,
    pub total: usize,
    pub last_updated: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolarityScores {
    pub compound: f64,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub state: String,
    pub city: String,
    pub county: String,
}
