use std::path::{Path, PathBuf};

use crate::dates::to_iso;
use crate::error::EtlError;
use crate::reconcile::ReconciledDataset;

pub const EPISODES_FILE: &str = "episodes.csv";
pub const COLORS_FILE: &str = "colors.csv";
pub const SUBJECTS_FILE: &str = "subjects.csv";
pub const EPISODE_COLORS_FILE: &str = "episode_colors.csv";
pub const EPISODE_SUBJECTS_FILE: &str = "episode_subjects.csv";

/// Write the five record sets as CSV files under `dir`, replacing any
/// previous artifacts. Returns the paths written.
pub fn write_clean_data(dir: &Path, data: &ReconciledDataset) -> Result<Vec<PathBuf>, EtlError> {
    std::fs::create_dir_all(dir).map_err(|e| EtlError::write_failed(dir, e))?;

    let written = vec![
        write_table(
            &dir.join(EPISODES_FILE),
            &[
                "id",
                "title",
                "season",
                "episode",
                "air_date",
                "youtube_src",
                "img_src",
                "num_colors",
                "extra_info",
            ],
            data.episodes.iter().map(|e| {
                vec![
                    e.id.to_string(),
                    e.title.clone(),
                    e.season.to_string(),
                    e.episode.to_string(),
                    e.air_date.as_ref().map(to_iso).unwrap_or_default(),
                    e.youtube_src.clone().unwrap_or_default(),
                    e.img_src.clone().unwrap_or_default(),
                    e.num_colors.to_string(),
                    e.extra_info_json().unwrap_or_default(),
                ]
            }),
        )?,
        write_table(
            &dir.join(COLORS_FILE),
            &["id", "name", "hex"],
            data.colors
                .iter()
                .map(|c| vec![c.id.to_string(), c.name.clone(), c.hex.clone()]),
        )?,
        write_table(
            &dir.join(SUBJECTS_FILE),
            &["id", "name"],
            data.subjects
                .iter()
                .map(|s| vec![s.id.to_string(), s.name.clone()]),
        )?,
        write_table(
            &dir.join(EPISODE_COLORS_FILE),
            &["episode_id", "color_id"],
            data.episode_colors
                .iter()
                .map(|ec| vec![ec.episode_id.to_string(), ec.color_id.to_string()]),
        )?,
        write_table(
            &dir.join(EPISODE_SUBJECTS_FILE),
            &["episode_id", "subject_id"],
            data.episode_subjects
                .iter()
                .map(|es| vec![es.episode_id.to_string(), es.subject_id.to_string()]),
        )?,
    ];

    log::info!("Cleaned data saved to {}", dir.display());
    Ok(written)
}

fn write_table(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<PathBuf, EtlError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| EtlError::write_failed(path, e))?;
    wtr.write_record(header)
        .map_err(|e| EtlError::write_failed(path, e))?;

    let mut count = 0usize;
    for row in rows {
        wtr.write_record(&row)
            .map_err(|e| EtlError::write_failed(path, e))?;
        count += 1;
    }
    wtr.flush().map_err(|e| EtlError::write_failed(path, e))?;

    log::debug!("Wrote {} rows to {}", count, path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Color, Episode, EpisodeColor, EpisodeSubject, Subject};
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> ReconciledDataset {
        let mut data = ReconciledDataset {
            episodes: vec![Episode {
                id: 1,
                title: "Cobalt Sky, Revisited".to_string(),
                season: 1,
                episode: 1,
                air_date: NaiveDate::from_ymd_opt(1985, 3, 3),
                youtube_src: Some("https://yt/1".to_string()),
                img_src: None,
                num_colors: 2,
                extra_info: Some(json!({ "special": "Pilot" })),
            }],
            colors: vec![
                Color {
                    id: 1,
                    name: "Titanium White".to_string(),
                    hex: "#FFFFFF".to_string(),
                },
                Color {
                    id: 2,
                    name: "Phthalo Blue".to_string(),
                    hex: "#0C2340".to_string(),
                },
            ],
            subjects: vec![Subject {
                id: 1,
                name: "Ocean".to_string(),
            }],
            ..Default::default()
        };
        data.episode_colors.insert(EpisodeColor { episode_id: 1, color_id: 2 });
        data.episode_colors.insert(EpisodeColor { episode_id: 1, color_id: 1 });
        data.episode_subjects.insert(EpisodeSubject { episode_id: 1, subject_id: 1 });
        data
    }

    #[test]
    fn test_writes_five_files_with_headers() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("clean");
        let written = write_clean_data(&out, &sample()).unwrap();
        assert_eq!(written.len(), 5);

        let episodes = std::fs::read_to_string(out.join(EPISODES_FILE)).unwrap();
        let mut lines = episodes.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,title,season,episode,air_date,youtube_src,img_src,num_colors,extra_info"
        );
        assert_eq!(
            lines.next().unwrap(),
            r#"1,"Cobalt Sky, Revisited",1,1,1985-03-03,https://yt/1,,2,"{""special"":""Pilot""}""#
        );

        let edges = std::fs::read_to_string(out.join(EPISODE_COLORS_FILE)).unwrap();
        assert_eq!(edges, "episode_id,color_id\n1,1\n1,2\n");

        let subjects = std::fs::read_to_string(out.join(SUBJECTS_FILE)).unwrap();
        assert_eq!(subjects, "id,name\n1,Ocean\n");
    }

    #[test]
    fn test_overwrites_previous_artifacts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(COLORS_FILE), "stale,stale\nx,y\nz,w\n").unwrap();

        let mut data = sample();
        data.colors.truncate(1);
        write_clean_data(dir.path(), &data).unwrap();

        let colors = std::fs::read_to_string(dir.path().join(COLORS_FILE)).unwrap();
        assert_eq!(colors, "id,name,hex\n1,Titanium White,#FFFFFF\n");
    }
}
