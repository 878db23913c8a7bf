use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::EtlError;

/// One row of the color-usage table.
///
/// `colors` and `color_hex` keep their serialized list form; they are decoded
/// during reconciliation so a bad cell can be reported against its episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorUsageRow {
    /// 1-based record position in the file. Becomes the episode id.
    pub ordinal: usize,
    pub season: u32,
    pub episode: u32,
    pub painting_title: Option<String>,
    pub youtube_src: Option<String>,
    pub img_src: Option<String>,
    pub num_colors: i64,
    pub colors: String,
    pub color_hex: String,
}

/// One row of the subject-matter table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectUsageRow {
    /// 1-based record position in the file.
    pub ordinal: usize,
    /// Episode code cell, e.g. `S01E01`.
    pub episode_code: String,
    pub title: String,
    /// Every non-identifier column, in header order.
    pub flags: Vec<SubjectFlag>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectFlag {
    pub column: String,
    pub present: bool,
}

impl SubjectUsageRow {
    /// Column names whose cell was truthy.
    pub fn present_columns(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|f| f.present)
            .map(|f| f.column.as_str())
    }
}

fn open_table(path: &Path) -> Result<csv::Reader<BufReader<File>>, EtlError> {
    let file = File::open(path).map_err(|e| EtlError::read_failed(path, e))?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .quote(b'"')
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

fn column(headers: &StringRecord, path: &Path, name: &'static str) -> Result<usize, EtlError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| EtlError::MissingColumn {
            path: path.to_path_buf(),
            column: name,
        })
}

/// Pull the next record, skipping (with a warning) records whose field count
/// is off. Any other CSV error, including bad encoding, is fatal.
fn next_record(
    records: &mut csv::StringRecordsIter<'_, BufReader<File>>,
    path: &Path,
) -> Option<Result<Option<StringRecord>, EtlError>> {
    match records.next()? {
        Ok(rec) => Some(Ok(Some(rec))),
        Err(e) if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. }) => {
            log::warn!("Skipping malformed record in {}: {}", path.display(), e);
            Some(Ok(None))
        }
        Err(e) => Some(Err(EtlError::table_failed(path, e))),
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Read the color-usage table.
pub fn read_color_usage(path: &Path) -> Result<Vec<ColorUsageRow>, EtlError> {
    let mut rdr = open_table(path)?;
    let headers = rdr
        .headers()
        .map_err(|e| EtlError::table_failed(path, e))?
        .clone();

    let idx_season = column(&headers, path, "season")?;
    let idx_episode = column(&headers, path, "episode")?;
    let idx_youtube = column(&headers, path, "youtube_src")?;
    let idx_img = column(&headers, path, "img_src")?;
    let idx_num_colors = column(&headers, path, "num_colors")?;
    let idx_colors = column(&headers, path, "colors")?;
    let idx_hex = column(&headers, path, "color_hex")?;
    let idx_title = headers.iter().position(|h| h == "painting_title");

    let mut rows = Vec::new();
    let mut records = rdr.records();
    let mut ordinal = 0usize;

    while let Some(next) = next_record(&mut records, path) {
        ordinal += 1;
        let Some(rec) = next? else {
            continue;
        };

        let season = rec[idx_season].parse::<u32>();
        let episode = rec[idx_episode].parse::<u32>();
        let num_colors = rec[idx_num_colors].parse::<i64>();
        let (Ok(season), Ok(episode), Ok(num_colors)) = (season, episode, num_colors) else {
            log::warn!(
                "Skipping color row {} in {}: non-numeric season/episode/num_colors",
                ordinal,
                path.display()
            );
            continue;
        };

        rows.push(ColorUsageRow {
            ordinal,
            season,
            episode,
            painting_title: idx_title.and_then(|i| non_empty(&rec[i])),
            youtube_src: non_empty(&rec[idx_youtube]),
            img_src: non_empty(&rec[idx_img]),
            num_colors,
            colors: rec[idx_colors].to_string(),
            color_hex: rec[idx_hex].to_string(),
        });
    }

    log::info!("Read {} color rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read the subject-matter table. The `TITLE` cell is stripped of quote
/// characters and surrounding whitespace.
pub fn read_subject_usage(path: &Path) -> Result<Vec<SubjectUsageRow>, EtlError> {
    let mut rdr = open_table(path)?;
    let headers = rdr
        .headers()
        .map_err(|e| EtlError::table_failed(path, e))?
        .clone();

    let idx_code = column(&headers, path, "EPISODE")?;
    let idx_title = column(&headers, path, "TITLE")?;
    let flag_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != idx_code && *i != idx_title)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut rows = Vec::new();
    let mut records = rdr.records();
    let mut ordinal = 0usize;

    while let Some(next) = next_record(&mut records, path) {
        ordinal += 1;
        let Some(rec) = next? else {
            continue;
        };

        rows.push(SubjectUsageRow {
            ordinal,
            episode_code: rec[idx_code].to_string(),
            title: rec[idx_title].replace('"', "").trim().to_string(),
            flags: flag_columns
                .iter()
                .map(|(i, name)| SubjectFlag {
                    column: name.clone(),
                    present: is_truthy(&rec[*i]),
                })
                .collect(),
        });
    }

    log::info!("Read {} subject rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Subject cells are `0`/`1`; some exports write `1.0`.
fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim();
    cell == "1" || cell.parse::<f64>().is_ok_and(|v| v == 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_color_rows_carry_file_ordinal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "colors.csv",
            "\
,painting_index,img_src,painting_title,season,episode,num_colors,youtube_src,colors,color_hex
0,282,https://img/1.png,A Walk in the Woods,1,1,2,https://yt/1,\"['Alizarin Crimson\\r\\n', 'Bright Red']\",\"['#4E1500', '#DB0000']\"
1,283,https://img/2.png,Mt. McKinley,1,2,1,https://yt/2,['Titanium White'],['#FFFFFF']
",
        );

        let rows = read_color_usage(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ordinal, 1);
        assert_eq!(rows[0].season, 1);
        assert_eq!(rows[0].episode, 1);
        assert_eq!(rows[0].num_colors, 2);
        assert_eq!(rows[0].painting_title.as_deref(), Some("A Walk in the Woods"));
        assert_eq!(rows[0].colors, r"['Alizarin Crimson\r\n', 'Bright Red']");
        assert_eq!(rows[1].ordinal, 2);
        assert_eq!(rows[1].youtube_src.as_deref(), Some("https://yt/2"));
    }

    #[test]
    fn test_malformed_color_row_keeps_later_ordinals() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "colors.csv",
            "\
season,episode,num_colors,img_src,youtube_src,colors,color_hex
one,1,1,,,['A'],['#000000']
1,2,1,,,['A'],['#000000']
",
        );

        let rows = read_color_usage(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].ordinal, 2);
        assert_eq!(rows[0].img_src, None);
    }

    #[test]
    fn test_missing_color_column() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "colors.csv", "season,episode\n1,1\n");
        let err = read_color_usage(&path).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
    }

    #[test]
    fn test_subject_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "subjects.csv",
            "\
EPISODE,TITLE,OCEAN,TREES,SNOW_COVERED_MOUNTAINS
S01E01,\"\"\"COBALT SKY\"\"\",1,0,1.0
S01E02,  Plain Title ,0,0,0
",
        );

        let rows = read_subject_usage(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].episode_code, "S01E01");
        assert_eq!(rows[0].title, "COBALT SKY");
        let present: Vec<_> = rows[0].present_columns().collect();
        assert_eq!(present, vec!["OCEAN", "SNOW_COVERED_MOUNTAINS"]);
        assert_eq!(rows[1].title, "Plain Title");
        assert_eq!(rows[1].present_columns().count(), 0);
        assert_eq!(rows[1].ordinal, 2);
    }

    #[test]
    fn test_missing_table_file() {
        let err = read_subject_usage(Path::new("/nonexistent/subjects.csv")).unwrap_err();
        assert!(matches!(err, EtlError::Source { .. }));
    }

    #[test]
    fn test_truthy_cells() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" 1.0 "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("yes"));
    }
}
