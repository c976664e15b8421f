use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::debug;

pub const DB_PATH_ENV: &str = "SOCIAL_DB_PATH";
pub const OUTPUT_PATH_ENV: &str = "FEEDBACK_OUTPUT_PATH";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub output_path: PathBuf,
}

impl Config {
    /// Flag, then environment, then the per-user data directory.
    pub fn resolve(db_flag: Option<PathBuf>, output_flag: Option<PathBuf>) -> Result<Self> {
        let data_dir = Self::data_dir();

        let db_path = db_flag
            .or_else(|| env_path(DB_PATH_ENV))
            .unwrap_or_else(|| data_dir.join("social.db"));
        let output_path = output_flag
            .or_else(|| env_path(OUTPUT_PATH_ENV))
            .unwrap_or_else(|| data_dir.join("api").join("entries-all.json"));

        let config = Self {
            db_path,
            output_path,
        };
        debug!(db = %config.db_path.display(), output = %config.output_path.display(), "Resolved config");
        Ok(config)
    }

    fn data_dir() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "social-feedback") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from(".")
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
