// End-to-end runs over raw files in a scratch directory
// Run with: cargo test --lib tests

#[cfg(test)]
mod pipeline_tests {
    use crate::clean_data::{COLORS_FILE, EPISODES_FILE, EPISODE_SUBJECTS_FILE};
    use crate::config::{EtlConfig, RetryPolicy, DEFAULT_DB_NAME};
    use crate::database::{Database, StoreConnector};
    use crate::error::EtlError;
    use crate::{run_pipeline, run_pipeline_with, store_counts, transform};
    use rusqlite::Connection;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const LISTING: &str = "\"Cobalt Sky\" (March 3, 1985)\n";
    const COLORS: &str = "\
,painting_index,img_src,painting_title,season,episode,num_colors,youtube_src,colors,color_hex
0,1,https://img/1.png,Cobalt Sky,1,1,2,https://yt/1,\"['Titanium White', 'Phthalo Blue']\",\"['#FFFFFF', '#0C2340']\"
";
    const SUBJECTS: &str = "\
EPISODE,TITLE,OCEAN,TREES
S01E01,\"\"\"COBALT SKY\"\"\",1,0
";

    fn setup(listing: &str, colors: &str, subjects: &str) -> (EtlConfig, TempDir) {
        let temp = TempDir::new().unwrap();
        let raw = temp.path().join("raw");
        std::fs::create_dir_all(&raw).unwrap();

        let mut config = EtlConfig::new(
            &raw,
            &temp.path().join("clean"),
            &temp.path().join("db"),
            DEFAULT_DB_NAME,
        );
        config.retry = RetryPolicy::new(2, Duration::ZERO);

        std::fs::write(&config.sources.episode_dates, listing).unwrap();
        std::fs::write(&config.sources.colors_used, colors).unwrap();
        std::fs::write(&config.sources.subject_matter, subjects).unwrap();
        (config, temp)
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_single_episode_end_to_end() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);
        let summary = run_pipeline(&config).unwrap();

        assert_eq!(summary.episodes, 1);
        assert_eq!(summary.colors, 2);
        assert_eq!(summary.subjects, 1);
        assert_eq!(summary.episode_colors, 2);
        assert_eq!(summary.episode_subjects, 1);
        assert_eq!(summary.clean_files.len(), 5);
        assert_eq!(summary.loaded.unwrap().episodes, 1);

        let db = Database::open(&config.db_path).unwrap();
        let ep = db.episode(1).unwrap().unwrap();
        assert_eq!(ep.title, "Cobalt Sky");
        assert_eq!(ep.air_date.unwrap().to_string(), "1985-03-03");

        let colors: Vec<_> = db
            .colors_for_episode(1)
            .unwrap()
            .into_iter()
            .map(|c| (c.id, c.name, c.hex))
            .collect();
        assert_eq!(
            colors,
            vec![
                (1, "Titanium White".to_string(), "#FFFFFF".to_string()),
                (2, "Phthalo Blue".to_string(), "#0C2340".to_string()),
            ]
        );
        let subjects = db.subjects_for_episode(1).unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].name, "Ocean");

        assert_eq!(
            read(&config.clean_dir.join(COLORS_FILE)),
            "id,name,hex\n1,Titanium White,#FFFFFF\n2,Phthalo Blue,#0C2340\n"
        );
        assert_eq!(
            read(&config.clean_dir.join(EPISODE_SUBJECTS_FILE)),
            "episode_id,subject_id\n1,1\n"
        );
    }

    #[test]
    fn test_running_twice_leaves_identical_store() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);

        run_pipeline(&config).unwrap();
        let first = Database::open(&config.db_path).unwrap().snapshot().unwrap();
        run_pipeline(&config).unwrap();
        let second = Database::open(&config.db_path).unwrap().snapshot().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_builtin_annotations_reach_the_store() {
        let listing: String = (1..=58)
            .map(|i| format!("\"Painting {i}\" (January 1, 1990)\n"))
            .collect();
        let mut colors = String::from("season,episode,num_colors,img_src,youtube_src,colors,color_hex\n");
        let mut subjects = String::from("EPISODE,TITLE,TREES\n");
        for i in 1..=58usize {
            let (season, episode) = crate::indexer::season_and_episode(i);
            colors.push_str(&format!("{season},{episode},0,,,[],[]\n"));
            subjects.push_str(&format!("S{season:02}E{episode:02},PAINTING {i},1\n"));
        }

        let (config, _temp) = setup(&listing, &colors, &subjects);
        run_pipeline(&config).unwrap();

        let db = Database::open(&config.db_path).unwrap();
        let ep = db.episode(58).unwrap().unwrap();
        assert_eq!(ep.title, "Painting 58");
        assert_eq!(ep.season, 5);
        assert_eq!(ep.episode, 6);
        assert_eq!(ep.extra_info.unwrap()["guest"], "Steve Ross");
        assert!(db.episode(57).unwrap().unwrap().extra_info.is_none());
        assert_eq!(db.table_counts().unwrap().subjects, 1);
    }

    #[test]
    fn test_missing_subject_aborts_before_load() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);
        run_pipeline(&config).unwrap();

        // Same store, but the subject table no longer covers the episode
        std::fs::write(
            &config.sources.subject_matter,
            "EPISODE,TITLE,OCEAN\nS09E09,ELSEWHERE,1\n",
        )
        .unwrap();

        let err = run_pipeline(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::MissingSubjectRow { .. })
        ));

        let db = Database::open(&config.db_path).unwrap();
        assert_eq!(db.table_counts().unwrap().episodes, 1);
    }

    #[test]
    fn test_unmatched_rows_are_skipped_not_fatal() {
        let colors = format!("{COLORS}1,2,,Lost,4,4,1,,['Bright Red'],['#DB0000']\n");
        let (config, _temp) = setup(LISTING, &colors, SUBJECTS);

        let (data, summary) = transform(&config).unwrap();
        assert_eq!(summary.color_rows, 2);
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(data.episodes.len(), 1);
        assert!(data.colors.iter().all(|c| c.hex != "#DB0000"));

        let episodes = read(&config.clean_dir.join(EPISODES_FILE));
        assert_eq!(episodes.lines().count(), 2);
        assert!(!config.db_path.exists());
    }

    #[test]
    fn test_missing_source_file_fails_fast() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);
        std::fs::remove_file(&config.sources.colors_used).unwrap();

        let err = transform(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::Source { .. })
        ));
        assert!(!config.clean_dir.exists());
    }

    #[test]
    fn test_listing_with_byte_order_mark() {
        let listing = format!("{}{LISTING}\"Second\" (March 10, 1985)\n", '\u{feff}');
        let (config, _temp) = setup(&listing, COLORS, SUBJECTS);

        let (data, summary) = transform(&config).unwrap();
        assert_eq!(summary.listing_entries, 2);
        assert_eq!(data.episodes[0].title, "Cobalt Sky");
        assert_eq!(data.episodes[0].air_date.unwrap().to_string(), "1985-03-03");
    }

    #[test]
    fn test_counts_require_an_existing_store() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);

        let err = store_counts(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::StoreMissing { .. })
        ));
        assert!(!config.db_path.exists());

        run_pipeline(&config).unwrap();
        let counts = store_counts(&config).unwrap();
        assert_eq!(counts.episodes, 1);
        assert_eq!(counts.episode_colors, 2);
    }

    struct OfflineStore;

    impl StoreConnector for OfflineStore {
        fn connect(&self) -> rusqlite::Result<Connection> {
            Err(rusqlite::Error::InvalidPath("offline".into()))
        }

        fn target(&self) -> String {
            "offline-store".to_string()
        }
    }

    #[test]
    fn test_unreachable_store_fails_run_after_clean_data() {
        let (config, _temp) = setup(LISTING, COLORS, SUBJECTS);

        let err = run_pipeline_with(&config, &OfflineStore).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::StoreUnreachable { attempts: 2, .. })
        ));
        assert!(config.clean_dir.join(EPISODES_FILE).exists());
    }
}
