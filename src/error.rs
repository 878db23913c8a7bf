use std::path::PathBuf;
use thiserror::Error;

/// Typed error hierarchy for the ETL run.
///
/// Parsing-level trouble (bad dates, odd listing lines, single malformed CSV
/// records) never reaches this type; it is logged and recovered where it
/// happens. Everything here terminates the run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("failed to read {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("table {path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("episode {episode_id}: cannot decode `{field}` list: {reason}")]
    ListLiteral {
        episode_id: i64,
        field: &'static str,
        reason: String,
    },

    #[error("episode {episode_id}: {names} color names but {hexes} hex codes")]
    ColorListMismatch {
        episode_id: i64,
        names: usize,
        hexes: usize,
    },

    #[error("episode {episode_id}: no subject row matches S{season:02}E{episode:02} or title {title:?}")]
    MissingSubjectRow {
        episode_id: i64,
        season: u32,
        episode: u32,
        title: String,
    },

    #[error("store {target} unreachable after {attempts} attempts: {source}")]
    StoreUnreachable {
        target: String,
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store {path} does not exist")]
    StoreMissing { path: PathBuf },

    #[error("annotation table {path}: {reason}")]
    Annotations { path: PathBuf, reason: String },

    #[error("failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

impl EtlError {
    pub(crate) fn read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Source {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn table_failed(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        EtlError::Table {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        EtlError::Output {
            path: path.into(),
            source: source.into(),
        }
    }

    /// True for faults that point at inconsistent source data rather than
    /// infrastructure.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            EtlError::ListLiteral { .. }
                | EtlError::ColorListMismatch { .. }
                | EtlError::MissingSubjectRow { .. }
        )
    }
}
