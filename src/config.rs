use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EPISODE_DATES_FILE: &str = "The Joy Of Painting - Episode Dates";
pub const COLORS_USED_FILE: &str = "The Joy Of Painiting - Colors Used";
pub const SUBJECT_MATTER_FILE: &str = "The Joy Of Painiting - Subject Matter";

pub const DEFAULT_DB_NAME: &str = "atlas_the_joy_of_painting_db";

/// Bounded fixed-delay retry used while waiting for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Locations of the three raw inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub episode_dates: PathBuf,
    pub colors_used: PathBuf,
    pub subject_matter: PathBuf,
}

impl SourcePaths {
    /// The historical file names inside `raw_dir`.
    pub fn in_dir(raw_dir: &Path) -> Self {
        Self {
            episode_dates: raw_dir.join(EPISODE_DATES_FILE),
            colors_used: raw_dir.join(COLORS_USED_FILE),
            subject_matter: raw_dir.join(SUBJECT_MATTER_FILE),
        }
    }
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub sources: SourcePaths,
    pub clean_dir: PathBuf,
    pub db_path: PathBuf,
    pub retry: RetryPolicy,
    /// Replaces the built-in annotation table when set.
    pub annotations: Option<PathBuf>,
}

impl EtlConfig {
    pub fn new(raw_dir: &Path, clean_dir: &Path, db_dir: &Path, db_name: &str) -> Self {
        Self {
            sources: SourcePaths::in_dir(raw_dir),
            clean_dir: clean_dir.to_path_buf(),
            db_path: db_path(db_dir, db_name),
            retry: RetryPolicy::default(),
            annotations: None,
        }
    }
}

pub fn db_path(db_dir: &Path, db_name: &str) -> PathBuf {
    db_dir.join(format!("{}.sqlite3", db_name))
}

/// `<local data dir>/joy-of-painting`, or `data` when the platform has none.
pub fn default_db_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("joy-of-painting"))
        .unwrap_or_else(|| PathBuf::from("data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_paths_keep_historical_names() {
        let paths = SourcePaths::in_dir(Path::new("raw"));
        assert_eq!(
            paths.colors_used,
            Path::new("raw/The Joy Of Painiting - Colors Used")
        );
        assert_eq!(
            paths.episode_dates,
            Path::new("raw/The Joy Of Painting - Episode Dates")
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = EtlConfig::new(
            Path::new("raw"),
            Path::new("clean"),
            Path::new("db"),
            DEFAULT_DB_NAME,
        );
        assert_eq!(
            config.db_path,
            Path::new("db/atlas_the_joy_of_painting_db.sqlite3")
        );
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.delay, Duration::from_secs(5));
        assert!(config.annotations.is_none());
    }
}
