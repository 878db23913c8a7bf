use chrono::NaiveDate;
use std::collections::HashMap;

use crate::sources::ListingEntry;

pub const EPISODES_PER_SEASON: usize = 13;

/// A listing entry with its season/episode position assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDate {
    pub ordinal: usize,
    pub season: u32,
    pub episode: u32,
    pub title: String,
    pub air_date: Option<NaiveDate>,
    pub notes: String,
}

/// `(season, episode)` for a 1-based ordinal.
pub fn season_and_episode(ordinal: usize) -> (u32, u32) {
    let zero_based = ordinal.saturating_sub(1);
    (
        (zero_based / EPISODES_PER_SEASON + 1) as u32,
        (zero_based % EPISODES_PER_SEASON + 1) as u32,
    )
}

/// Season/episode lookup over the episode listing. The listing is the
/// authoritative source for titles and air dates.
#[derive(Debug, Clone, Default)]
pub struct EpisodeIndex {
    entries: Vec<EpisodeDate>,
    by_position: HashMap<(u32, u32), usize>,
}

impl EpisodeIndex {
    pub fn build(listing: &[ListingEntry]) -> Self {
        let mut entries: Vec<EpisodeDate> = listing
            .iter()
            .map(|entry| {
                let (season, episode) = season_and_episode(entry.ordinal);
                EpisodeDate {
                    ordinal: entry.ordinal,
                    season,
                    episode,
                    title: entry.title.clone(),
                    air_date: entry.air_date,
                    notes: entry.notes.clone(),
                }
            })
            .collect();
        entries.sort_by_key(|e| e.ordinal);

        let mut by_position = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_position.entry((entry.season, entry.episode)).or_insert(i);
        }

        log::info!("Indexed {} listing entries", entries.len());
        Self {
            entries,
            by_position,
        }
    }

    pub fn get(&self, season: u32, episode: u32) -> Option<&EpisodeDate> {
        self.by_position
            .get(&(season, episode))
            .map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[EpisodeDate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
