//! Readers for the three raw inputs. None of them modify their files.

pub mod listing;
pub mod literal;
pub mod tables;

pub use listing::{parse_listing, read_listing, ListingEntry};
pub use literal::parse_string_list;
pub use tables::{
    read_color_usage, read_subject_usage, ColorUsageRow, SubjectFlag, SubjectUsageRow,
};

use crate::config::SourcePaths;
use crate::error::EtlError;

/// Parsed contents of all three raw inputs.
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    pub listing: Vec<ListingEntry>,
    pub color_rows: Vec<ColorUsageRow>,
    pub subject_rows: Vec<SubjectUsageRow>,
}

/// Read every source, failing on the first missing or unreadable file.
pub fn read_all(paths: &SourcePaths) -> Result<RawSources, EtlError> {
    Ok(RawSources {
        listing: read_listing(&paths.episode_dates)?,
        color_rows: read_color_usage(&paths.colors_used)?,
        subject_rows: read_subject_usage(&paths.subject_matter)?,
    })
}
