use chrono::NaiveDate;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::dates::parse_air_date;
use crate::error::EtlError;

/// One recognised line of the episode listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// 1-based position among the lines that matched the listing shape.
    pub ordinal: usize,
    pub title: String,
    pub air_date: Option<NaiveDate>,
    pub notes: String,
}

const LINE_PATTERN: &str =
    r#"^"(?P<title>.+?)"\s+\((?P<date>.+?)\)(?:\s+-\s+(?P<notes>.+))?$"#;

static LINE_RE: OnceLock<Regex> = OnceLock::new();

fn line_pattern() -> &'static Regex {
    LINE_RE.get_or_init(|| Regex::new(LINE_PATTERN).expect("listing pattern is valid"))
}

/// Read the free-text listing of `"<title>" (<date>) - <notes>` lines.
pub fn read_listing(path: &Path) -> Result<Vec<ListingEntry>, EtlError> {
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::read_failed(path, e))?;
    let entries = parse_listing(&content);
    log::info!(
        "Read {} listing entries from {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

/// Parse listing text. Lines that don't have the expected shape are skipped.
/// A leading byte-order mark is ignored.
pub fn parse_listing(content: &str) -> Vec<ListingEntry> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let re = line_pattern();

    let mut entries = Vec::new();
    for line in content.lines() {
        let Some(caps) = re.captures(line.trim()) else {
            log::debug!("Skipping listing line: {:?}", line);
            continue;
        };

        let mut date = &caps["date"];
        if let Some(stripped) = date.strip_suffix(')') {
            date = stripped;
        }

        entries.push(ListingEntry {
            ordinal: entries.len() + 1,
            title: caps["title"].to_string(),
            air_date: parse_air_date(date),
            notes: caps
                .name("notes")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        });
    }
    entries
}
