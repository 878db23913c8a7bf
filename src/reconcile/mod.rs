//! Record linkage across the listing, color-usage and subject tables.
//!
//! The color-usage table drives the run: each of its rows is one physical
//! episode and its file ordinal is the episode id. Colors and subjects are
//! collapsed into canonical entities through explicit registries that the
//! caller owns, so [`reconcile_with`] is a pure function of its inputs.


use std::collections::{BTreeSet, HashMap};

use crate::annotations::AnnotationTable;
use crate::database::models::{Color, Episode, EpisodeColor, EpisodeSubject, Subject};
use crate::error::EtlError;
use crate::indexer::{EpisodeDate, EpisodeIndex};
use crate::sources::{parse_string_list, ColorUsageRow, SubjectUsageRow};

// =========================================================================
// Canonical entity registries
// =========================================================================

/// Colors deduplicated by hex code. Ids are dense and follow first sight.
#[derive(Debug, Clone, Default)]
pub struct ColorRegistry {
    by_hex: HashMap<String, i64>,
    colors: Vec<Color>,
}

impl ColorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the color with this hex code, creating it on first sight. The
    /// first name seen for a hex code is the one kept.
    pub fn resolve(&mut self, name: &str, hex: &str) -> i64 {
        let hex = hex.trim();
        if let Some(&id) = self.by_hex.get(hex) {
            return id;
        }

        let id = self.colors.len() as i64 + 1;
        self.colors.push(Color {
            id,
            name: name.trim().to_string(),
            hex: hex.to_string(),
        });
        self.by_hex.insert(hex.to_string(), id);
        id
    }

    pub fn get(&self, hex: &str) -> Option<&Color> {
        self.by_hex
            .get(hex.trim())
            .map(|&id| &self.colors[(id - 1) as usize])
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn into_colors(self) -> Vec<Color> {
        self.colors
    }
}

/// Subjects deduplicated by normalized name.
#[derive(Debug, Clone, Default)]
pub struct SubjectRegistry {
    by_name: HashMap<String, i64>,
    subjects: Vec<Subject>,
}

impl SubjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the subject for a raw column name, creating it on first sight.
    pub fn resolve(&mut self, column: &str) -> i64 {
        let name = normalize_subject_name(column);
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }

        let id = self.subjects.len() as i64 + 1;
        self.by_name.insert(name.clone(), id);
        self.subjects.push(Subject { id, name });
        id
    }

    pub fn get(&self, name: &str) -> Option<&Subject> {
        self.by_name
            .get(name)
            .map(|&id| &self.subjects[(id - 1) as usize])
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn into_subjects(self) -> Vec<Subject> {
        self.subjects
    }
}

/// `snow_covered_mountains ` -> `Snow Covered Mountains`.
pub fn normalize_subject_name(column: &str) -> String {
    title_case(&column.trim().replace('_', " "))
}

/// Uppercase every letter that follows a non-letter, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if prev_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_is_letter = c.is_alphabetic();
    }
    out
}

// =========================================================================
// Output
// =========================================================================

/// A color-usage row that had no counterpart in the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedRow {
    pub ordinal: usize,
    pub season: u32,
    pub episode: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ReconciledDataset {
    pub episodes: Vec<Episode>,
    pub colors: Vec<Color>,
    pub subjects: Vec<Subject>,
    pub episode_colors: BTreeSet<EpisodeColor>,
    pub episode_subjects: BTreeSet<EpisodeSubject>,
    pub skipped: Vec<SkippedRow>,
}

// =========================================================================
// Engine
// =========================================================================

/// Reconcile with fresh registries.
pub fn reconcile(
    index: &EpisodeIndex,
    color_rows: &[ColorUsageRow],
    subject_rows: &[SubjectUsageRow],
    annotations: &AnnotationTable,
) -> Result<ReconciledDataset, EtlError> {
    reconcile_with(
        index,
        color_rows,
        subject_rows,
        annotations,
        ColorRegistry::new(),
        SubjectRegistry::new(),
    )
}

/// Join the three sources per color-usage row.
///
/// Rows are processed in ordinal order whatever order they arrive in. A row
/// whose season/episode is missing from the listing is skipped with a
/// warning. A row with no subject row, an undecodable color list, or color
/// and hex lists of different lengths aborts the whole reconciliation.
pub fn reconcile_with(
    index: &EpisodeIndex,
    color_rows: &[ColorUsageRow],
    subject_rows: &[SubjectUsageRow],
    annotations: &AnnotationTable,
    mut colors: ColorRegistry,
    mut subjects: SubjectRegistry,
) -> Result<ReconciledDataset, EtlError> {
    let mut color_rows: Vec<&ColorUsageRow> = color_rows.iter().collect();
    color_rows.sort_by_key(|r| r.ordinal);
    let mut subject_rows: Vec<&SubjectUsageRow> = subject_rows.iter().collect();
    subject_rows.sort_by_key(|r| r.ordinal);

    let mut out = ReconciledDataset::default();

    for row in color_rows {
        let episode_id = row.ordinal as i64;

        let Some(date) = index.get(row.season, row.episode) else {
            log::warn!(
                "Could not find episode {}-{} in dates list. Skipping row {}.",
                row.season,
                row.episode,
                row.ordinal
            );
            out.skipped.push(SkippedRow {
                ordinal: row.ordinal,
                season: row.season,
                episode: row.episode,
            });
            continue;
        };

        let subject_row = match_subject_row(&subject_rows, date).ok_or_else(|| {
            EtlError::MissingSubjectRow {
                episode_id,
                season: date.season,
                episode: date.episode,
                title: date.title.clone(),
            }
        })?;

        out.episodes.push(Episode {
            id: episode_id,
            title: date.title.clone(),
            season: i64::from(row.season),
            episode: i64::from(row.episode),
            air_date: date.air_date,
            youtube_src: row.youtube_src.clone(),
            img_src: row.img_src.clone(),
            num_colors: row.num_colors,
            extra_info: annotations.lookup(episode_id).cloned(),
        });

        for (name, hex) in color_pairs(episode_id, row)? {
            let color_id = colors.resolve(&name, &hex);
            out.episode_colors.insert(EpisodeColor {
                episode_id,
                color_id,
            });
        }

        for column in subject_row.present_columns() {
            let subject_id = subjects.resolve(column);
            out.episode_subjects.insert(EpisodeSubject {
                episode_id,
                subject_id,
            });
        }
    }

    out.colors = colors.into_colors();
    out.subjects = subjects.into_subjects();

    log::info!(
        "Reconciled {} episodes ({} skipped): {} colors, {} subjects, {} color edges, {} subject edges",
        out.episodes.len(),
        out.skipped.len(),
        out.colors.len(),
        out.subjects.len(),
        out.episode_colors.len(),
        out.episode_subjects.len()
    );
    Ok(out)
}

/// Decode and pair a row's color names with its hex codes. The lists must be
/// the same length.
pub fn color_pairs(
    episode_id: i64,
    row: &ColorUsageRow,
) -> Result<Vec<(String, String)>, EtlError> {
    let names = parse_string_list(&row.colors).map_err(|reason| EtlError::ListLiteral {
        episode_id,
        field: "colors",
        reason,
    })?;
    let hexes = parse_string_list(&row.color_hex).map_err(|reason| EtlError::ListLiteral {
        episode_id,
        field: "color_hex",
        reason,
    })?;

    if names.len() != hexes.len() {
        return Err(EtlError::ColorListMismatch {
            episode_id,
            names: names.len(),
            hexes: hexes.len(),
        });
    }

    Ok(names
        .into_iter()
        .zip(hexes)
        .map(|(name, hex)| (name.trim().to_string(), hex.trim().to_string()))
        .collect())
}

/// First subject row, in file order, whose episode code contains
/// `SxxEyy` or whose title equals the listing title.
///
/// `rows` must already be sorted by ordinal. When the first code match and
/// the first title match are different rows the earlier one wins and a
/// warning is logged.
pub fn match_subject_row<'a>(
    rows: &[&'a SubjectUsageRow],
    date: &EpisodeDate,
) -> Option<&'a SubjectUsageRow> {
    let code = format!("S{:02}E{:02}", date.season, date.episode);

    let by_code = rows.iter().find(|r| r.episode_code.contains(&code)).copied();
    let by_title = rows.iter().find(|r| r.title == date.title).copied();

    match (by_code, by_title) {
        (Some(c), Some(t)) if c.ordinal != t.ordinal => {
            log::warn!(
                "Ambiguous subject match for {} {:?}: code matches row {}, title matches row {}; using row {}",
                code,
                date.title,
                c.ordinal,
                t.ordinal,
                c.ordinal.min(t.ordinal)
            );
            Some(if c.ordinal < t.ordinal { c } else { t })
        }
        (Some(c), _) => Some(c),
        (None, t) => t,
    }
}
