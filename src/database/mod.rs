pub mod models;


use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Statement};
use std::path::{Path, PathBuf};

pub use models::*;

use crate::config::RetryPolicy;
use crate::dates::to_iso;
use crate::error::EtlError;
use crate::reconcile::ReconciledDataset;

/// Destination tables, children first.
const TABLES: [&str; 5] = [
    "episode_colors",
    "episode_subjects",
    "episodes",
    "colors",
    "subjects",
];

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS colors (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        hex TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS episodes (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        season INTEGER NOT NULL,
        episode INTEGER NOT NULL,
        air_date TEXT,
        youtube_src TEXT,
        img_src TEXT,
        num_colors INTEGER,
        extra_info TEXT -- JSON object
    );

    CREATE INDEX IF NOT EXISTS idx_episodes_season_episode
        ON episodes(season, episode);

    CREATE TABLE IF NOT EXISTS episode_colors (
        episode_id INTEGER NOT NULL,
        color_id INTEGER NOT NULL,
        PRIMARY KEY (episode_id, color_id),
        FOREIGN KEY (episode_id) REFERENCES episodes(id),
        FOREIGN KEY (color_id) REFERENCES colors(id)
    );

    CREATE INDEX IF NOT EXISTS idx_episode_colors_color ON episode_colors(color_id);

    CREATE TABLE IF NOT EXISTS episode_subjects (
        episode_id INTEGER NOT NULL,
        subject_id INTEGER NOT NULL,
        PRIMARY KEY (episode_id, subject_id),
        FOREIGN KEY (episode_id) REFERENCES episodes(id),
        FOREIGN KEY (subject_id) REFERENCES subjects(id)
    );

    CREATE INDEX IF NOT EXISTS idx_episode_subjects_subject ON episode_subjects(subject_id);
"#;

// =========================================================================
// Connectivity
// =========================================================================

/// Something that can hand out connections to the destination store.
pub trait StoreConnector {
    /// Open a fresh connection.
    fn connect(&self) -> rusqlite::Result<Connection>;

    /// Human-readable description for logs and errors.
    fn target(&self) -> String;

    /// Make sure the database itself exists before anyone connects.
    fn ensure_database(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// SQLite file store at `<dir>/<name>.sqlite3`.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    create: bool,
}

impl SqliteConnector {
    /// Creates the file (and its directory) when missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: true,
        }
    }

    /// Connects only to a file that is already there.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreConnector for SqliteConnector {
    fn connect(&self) -> rusqlite::Result<Connection> {
        if self.create {
            Connection::open(&self.path)
        } else {
            Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        }
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    fn ensure_database(&self) -> std::io::Result<()> {
        if !self.create {
            return Ok(());
        }
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

/// Connect and ping, retrying per `policy`. Fails with
/// [`EtlError::StoreUnreachable`] once attempts run out.
pub fn wait_for_store(
    connector: &dyn StoreConnector,
    policy: &RetryPolicy,
) -> Result<Connection, EtlError> {
    let max_attempts = policy.max_attempts.max(1);
    log::info!("Waiting for store {} to become available...", connector.target());

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = connector.connect().and_then(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(conn)
        });

        match result {
            Ok(conn) => {
                log::info!("Store is available (attempt {}/{})", attempt, max_attempts);
                return Ok(conn);
            }
            Err(e) if attempt < max_attempts => {
                log::warn!(
                    "Attempt {}/{}: connection failed ({}). Retrying in {:?}...",
                    attempt,
                    max_attempts,
                    e,
                    policy.delay
                );
                std::thread::sleep(policy.delay);
            }
            Err(e) => {
                log::error!("Failed to connect to the store after {} attempts", attempt);
                return Err(EtlError::StoreUnreachable {
                    target: connector.target(),
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

// =========================================================================
// Database
// =========================================================================

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Ensure the database exists, wait for it, and apply the schema.
    pub fn connect(connector: &dyn StoreConnector, policy: &RetryPolicy) -> Result<Self> {
        connector
            .ensure_database()
            .with_context(|| format!("creating database {}", connector.target()))?;

        let conn = wait_for_store(connector, policy)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        ",
        )?;

        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a local SQLite store without retrying.
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::connect(&SqliteConnector::new(db_path), &RetryPolicy::once())
    }

    /// Open a store that must already exist. Nothing is created and the
    /// schema is left as found.
    pub fn open_existing(db_path: &Path, policy: &RetryPolicy) -> Result<Self> {
        if !db_path.is_file() {
            return Err(EtlError::StoreMissing {
                path: db_path.to_path_buf(),
            }
            .into());
        }

        let conn = wait_for_store(&SqliteConnector::existing(db_path), policy)?;
        Ok(Self { conn })
    }

    fn init_schema(&self) -> Result<()> {
        log::info!("...Checking for database schema...");
        self.conn
            .execute_batch(SCHEMA)
            .context("applying schema script")?;
        Ok(())
    }

    // =====================================================================
    // Full replace
    // =====================================================================

    /// Discard every destination row and load `data` in its place.
    ///
    /// Each step commits on its own: a failure rolls back only the step in
    /// flight, so earlier steps (including the truncate) stay applied.
    pub fn replace_all(&mut self, data: &ReconciledDataset) -> Result<LoadSummary> {
        self.truncate_all()?;
        log::info!("Existing data truncated.");

        let colors = self.bulk_insert(
            "colors",
            "INSERT INTO colors (id, name, hex) VALUES (?1, ?2, ?3)",
            &data.colors,
            |stmt, c| stmt.execute(params![c.id, c.name, c.hex]),
        )?;

        let subjects = self.bulk_insert(
            "subjects",
            "INSERT INTO subjects (id, name) VALUES (?1, ?2)",
            &data.subjects,
            |stmt, s| stmt.execute(params![s.id, s.name]),
        )?;

        let episodes = self.bulk_insert(
            "episodes",
            "INSERT INTO episodes (id, title, season, episode, air_date, youtube_src, img_src, num_colors, extra_info)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            &data.episodes,
            |stmt, e| {
                stmt.execute(params![
                    e.id,
                    e.title,
                    e.season,
                    e.episode,
                    e.air_date.as_ref().map(to_iso),
                    e.youtube_src,
                    e.img_src,
                    e.num_colors,
                    e.extra_info_json(),
                ])
            },
        )?;

        let episode_colors = self.bulk_insert(
            "episode_colors",
            "INSERT INTO episode_colors (episode_id, color_id) VALUES (?1, ?2)",
            &data.episode_colors,
            |stmt, ec| stmt.execute(params![ec.episode_id, ec.color_id]),
        )?;

        let episode_subjects = self.bulk_insert(
            "episode_subjects",
            "INSERT INTO episode_subjects (episode_id, subject_id) VALUES (?1, ?2)",
            &data.episode_subjects,
            |stmt, es| stmt.execute(params![es.episode_id, es.subject_id]),
        )?;

        Ok(LoadSummary {
            colors,
            subjects,
            episodes,
            episode_colors,
            episode_subjects,
        })
    }

    fn truncate_all(&mut self) -> Result<()> {
        // SQLite ignores this pragma inside a transaction
        self.conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        let deleted = delete_all_rows(&mut self.conn);

        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        deleted.context("truncating destination tables")
    }

    fn bulk_insert<'r, T: 'r>(
        &mut self,
        table: &'static str,
        sql: &str,
        rows: impl IntoIterator<Item = &'r T>,
        mut insert: impl FnMut(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
    ) -> Result<usize> {
        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("starting {} load", table))?;

        let mut count = 0;
        {
            let mut stmt = tx
                .prepare(sql)
                .with_context(|| format!("preparing {} insert", table))?;
            for row in rows {
                insert(&mut stmt, row).with_context(|| format!("loading {}", table))?;
                count += 1;
            }
        }

        tx.commit()
            .with_context(|| format!("committing {} load", table))?;
        log::info!("Inserted {} rows into {}", count, table);
        Ok(count)
    }

    // =====================================================================
    // Read-back
    // =====================================================================

    pub fn table_counts(&self) -> Result<TableCounts> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n)
        };

        Ok(TableCounts {
            episodes: count("episodes")?,
            colors: count("colors")?,
            subjects: count("subjects")?,
            episode_colors: count("episode_colors")?,
            episode_subjects: count("episode_subjects")?,
        })
    }

    pub fn episode(&self, id: i64) -> Result<Option<Episode>> {
        let episode = self
            .conn
            .query_row(
                "SELECT id, title, season, episode, air_date, youtube_src, img_src, num_colors, extra_info
                 FROM episodes WHERE id = ?",
                params![id],
                episode_from_row,
            )
            .optional()?;
        Ok(episode)
    }

    pub fn colors_for_episode(&self, episode_id: i64) -> Result<Vec<Color>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.hex
             FROM colors c
             JOIN episode_colors ec ON ec.color_id = c.id
             WHERE ec.episode_id = ?
             ORDER BY c.id",
        )?;
        let colors = stmt
            .query_map(params![episode_id], |row| {
                Ok(Color {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    hex: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(colors)
    }

    pub fn subjects_for_episode(&self, episode_id: i64) -> Result<Vec<Subject>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.name
             FROM subjects s
             JOIN episode_subjects es ON es.subject_id = s.id
             WHERE es.episode_id = ?
             ORDER BY s.id",
        )?;
        let subjects = stmt
            .query_map(params![episode_id], |row| {
                Ok(Subject {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }

    /// Every row of every destination table, ordered by key.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        let episodes = self
            .conn
            .prepare(
                "SELECT id, title, season, episode, air_date, youtube_src, img_src, num_colors, extra_info
                 FROM episodes ORDER BY id",
            )?
            .query_map([], episode_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let colors = self
            .conn
            .prepare("SELECT id, name, hex FROM colors ORDER BY id")?
            .query_map([], |row| {
                Ok(Color {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    hex: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let subjects = self
            .conn
            .prepare("SELECT id, name FROM subjects ORDER BY id")?
            .query_map([], |row| {
                Ok(Subject {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let episode_colors = self
            .conn
            .prepare("SELECT episode_id, color_id FROM episode_colors ORDER BY episode_id, color_id")?
            .query_map([], |row| {
                Ok(EpisodeColor {
                    episode_id: row.get(0)?,
                    color_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let episode_subjects = self
            .conn
            .prepare(
                "SELECT episode_id, subject_id FROM episode_subjects ORDER BY episode_id, subject_id",
            )?
            .query_map([], |row| {
                Ok(EpisodeSubject {
                    episode_id: row.get(0)?,
                    subject_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreSnapshot {
            episodes,
            colors,
            subjects,
            episode_colors,
            episode_subjects,
        })
    }
}

fn delete_all_rows(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for table in TABLES {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    tx.commit()
}

fn episode_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Episode> {
    let air_date = row
        .get::<_, Option<String>>(4)?
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))
        })
        .transpose()?;

    let extra_info = row
        .get::<_, Option<String>>(8)?
        .map(|s| {
            serde_json::from_str(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(Episode {
        id: row.get(0)?,
        title: row.get(1)?,
        season: row.get(2)?,
        episode: row.get(3)?,
        air_date,
        youtube_src: row.get(5)?,
        img_src: row.get(6)?,
        num_colors: row.get(7)?,
        extra_info,
    })
}
