pub mod annotations;
pub mod clean_data;
pub mod config;
pub mod database;
pub mod dates;
pub mod error;
pub mod indexer;
pub mod reconcile;
pub mod sources;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::path::PathBuf;

use annotations::AnnotationTable;
use config::EtlConfig;
use database::{Database, LoadSummary, SqliteConnector, StoreConnector, TableCounts};
use error::EtlError;
use indexer::EpisodeIndex;
use reconcile::ReconciledDataset;

/// What a run read, produced, and loaded.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub listing_entries: usize,
    pub color_rows: usize,
    pub subject_rows: usize,
    pub episodes: usize,
    pub skipped_rows: usize,
    pub colors: usize,
    pub subjects: usize,
    pub episode_colors: usize,
    pub episode_subjects: usize,
    pub clean_files: Vec<PathBuf>,
    pub loaded: Option<LoadSummary>,
}

impl std::fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} episodes ({} rows skipped), {} colors, {} subjects, {} color edges, {} subject edges",
            self.episodes,
            self.skipped_rows,
            self.colors,
            self.subjects,
            self.episode_colors,
            self.episode_subjects
        )
    }
}

/// The configured annotation file, or the built-in table.
pub fn load_annotations(config: &EtlConfig) -> Result<AnnotationTable, EtlError> {
    match &config.annotations {
        Some(path) => AnnotationTable::from_yaml_file(path),
        None => Ok(AnnotationTable::builtin()),
    }
}

/// Read, index, reconcile, and write clean-data artifacts. The store is
/// never touched.
pub fn transform(config: &EtlConfig) -> Result<(ReconciledDataset, PipelineSummary)> {
    log::info!("...Extracting data from files...");
    let raw = sources::read_all(&config.sources)?;
    let annotations = load_annotations(config)?;

    let index = EpisodeIndex::build(&raw.listing);

    log::info!("...Transforming and sanitizing data...");
    let data = reconcile::reconcile(&index, &raw.color_rows, &raw.subject_rows, &annotations)
        .context("reconciling sources")?;

    let clean_files = clean_data::write_clean_data(&config.clean_dir, &data)?;

    let summary = PipelineSummary {
        listing_entries: raw.listing.len(),
        color_rows: raw.color_rows.len(),
        subject_rows: raw.subject_rows.len(),
        episodes: data.episodes.len(),
        skipped_rows: data.skipped.len(),
        colors: data.colors.len(),
        subjects: data.subjects.len(),
        episode_colors: data.episode_colors.len(),
        episode_subjects: data.episode_subjects.len(),
        clean_files,
        loaded: None,
    };
    Ok((data, summary))
}

/// Full run against the configured SQLite store.
pub fn run_pipeline(config: &EtlConfig) -> Result<PipelineSummary> {
    run_pipeline_with(config, &SqliteConnector::new(&config.db_path))
}

/// Full run against any store reachable through `connector`.
pub fn run_pipeline_with(
    config: &EtlConfig,
    connector: &dyn StoreConnector,
) -> Result<PipelineSummary> {
    let span = tracing::info_span!("etl_run", store = %connector.target());
    let _guard = span.enter();

    log::info!("Starting ETL process...");
    let (data, mut summary) = transform(config)?;

    log::info!("...Loading data into {}...", connector.target());
    let mut db = Database::connect(connector, &config.retry)?;
    let loaded = db
        .replace_all(&data)
        .context("loading destination store")?;
    summary.loaded = Some(loaded);

    log::info!("ETL process completed: {}", summary);
    Ok(summary)
}

/// Row counts in the configured store, which must already exist.
pub fn store_counts(config: &EtlConfig) -> Result<TableCounts> {
    let db = Database::open_existing(&config.db_path, &config.retry)?;
    db.table_counts()
}
