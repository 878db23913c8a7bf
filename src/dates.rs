use chrono::NaiveDate;

/// Accepted air-date layouts, tried in order.
const DATE_FORMATS: [&str; 4] = ["%B %d, %Y", "%d %B %Y", "%b %d, %Y", "%d %b %Y"];

/// Parse a free-text air date such as `January 11, 1983` or
/// `11 Jan 1983) - rerun`.
///
/// Everything from the first `)` onward is discarded. Returns `None` (after a
/// warning) when no layout matches; callers store a null date and move on.
pub fn parse_air_date(fragment: &str) -> Option<NaiveDate> {
    let date_part = fragment.split(')').next().unwrap_or_default().trim();

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok());

    if parsed.is_none() {
        log::warn!("Could not parse date: {:?}", fragment);
    }
    parsed
}

/// Canonical `YYYY-MM-DD` rendering used in artifacts and the store.
pub fn to_iso(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
