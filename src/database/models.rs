use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub title: String,
    pub season: i64,
    pub episode: i64,
    pub air_date: Option<NaiveDate>,
    pub youtube_src: Option<String>,
    pub img_src: Option<String>,
    pub num_colors: i64,
    pub extra_info: Option<serde_json::Value>,
}

impl Episode {
    /// `extra_info` as stored: compact JSON text.
    pub fn extra_info_json(&self) -> Option<String> {
        self.extra_info.as_ref().map(|v| v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub id: i64,
    pub name: String,
    pub hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
}

// ============================================================================
// Association edges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeColor {
    pub episode_id: i64,
    pub color_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeSubject {
    pub episode_id: i64,
    pub subject_id: i64,
}

// ============================================================================
// Read-back
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub episodes: i64,
    pub colors: i64,
    pub subjects: i64,
    pub episode_colors: i64,
    pub episode_subjects: i64,
}

impl std::fmt::Display for TableCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "episodes={} colors={} subjects={} episode_colors={} episode_subjects={}",
            self.episodes, self.colors, self.subjects, self.episode_colors, self.episode_subjects
        )
    }
}

/// Full contents of the five destination tables, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub episodes: Vec<Episode>,
    pub colors: Vec<Color>,
    pub subjects: Vec<Subject>,
    pub episode_colors: Vec<EpisodeColor>,
    pub episode_subjects: Vec<EpisodeSubject>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub colors: usize,
    pub subjects: usize,
    pub episodes: usize,
    pub episode_colors: usize,
    pub episode_subjects: usize,
}
