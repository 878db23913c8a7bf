use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use joy_of_painting_etl::config::{self, EtlConfig, RetryPolicy, SourcePaths};
use joy_of_painting_etl::{run_pipeline, store_counts, transform};

#[derive(Parser, Debug)]
#[command(name = "joy-etl", version, about = "Joy of Painting episode ETL")]
struct Cli {
    #[command(flatten)]
    opts: Opts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Read, reconcile, write clean data, and replace the store contents
    Run,
    /// Read, reconcile, and write clean data without touching the store
    Transform,
    /// Print row counts for the destination tables
    Counts,
}

#[derive(Args, Debug)]
struct Opts {
    /// Directory holding the three raw source files
    #[arg(long, env = "ETL_RAW_DIR", default_value = "data/raw_data", global = true)]
    raw_dir: PathBuf,

    /// Override the episode listing file
    #[arg(long, global = true)]
    dates_file: Option<PathBuf>,

    /// Override the color-usage table
    #[arg(long, global = true)]
    colors_file: Option<PathBuf>,

    /// Override the subject-matter table
    #[arg(long, global = true)]
    subjects_file: Option<PathBuf>,

    /// Where the clean CSV artifacts go
    #[arg(long, env = "ETL_CLEAN_DIR", default_value = "data/clean_data", global = true)]
    clean_dir: PathBuf,

    /// Directory of the destination store (defaults to the local data dir)
    #[arg(long, env = "DB_DIR", global = true)]
    db_dir: Option<PathBuf>,

    /// Destination database name
    #[arg(long, env = "DB_NAME", default_value = config::DEFAULT_DB_NAME, global = true)]
    db_name: String,

    /// Connection attempts before giving up
    #[arg(long, env = "ETL_CONNECT_RETRIES", default_value_t = 10, global = true)]
    connect_retries: u32,

    /// Seconds between connection attempts
    #[arg(long, env = "ETL_CONNECT_DELAY_SECS", default_value_t = 5, global = true)]
    connect_delay_secs: u64,

    /// YAML file replacing the built-in episode annotations
    #[arg(long, env = "ETL_ANNOTATIONS", global = true)]
    annotations: Option<PathBuf>,
}

impl Opts {
    fn into_config(self) -> EtlConfig {
        let db_dir = self.db_dir.unwrap_or_else(config::default_db_dir);
        let mut cfg = EtlConfig::new(&self.raw_dir, &self.clean_dir, &db_dir, &self.db_name);

        let defaults = SourcePaths::in_dir(&self.raw_dir);
        cfg.sources = SourcePaths {
            episode_dates: self.dates_file.unwrap_or(defaults.episode_dates),
            colors_used: self.colors_file.unwrap_or(defaults.colors_used),
            subject_matter: self.subjects_file.unwrap_or(defaults.subject_matter),
        };
        cfg.retry = RetryPolicy::new(
            self.connect_retries,
            Duration::from_secs(self.connect_delay_secs),
        );
        cfg.annotations = self.annotations;
        cfg
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("ETL failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let cfg = cli.opts.into_config();

    match cli.command {
        Commands::Run => {
            let summary = run_pipeline(&cfg)?;
            tracing::info!("ETL succeeded: {}", summary);
        }
        Commands::Transform => {
            let (_, summary) = transform(&cfg)?;
            tracing::info!("Transform succeeded: {}", summary);
            for path in &summary.clean_files {
                tracing::info!("  wrote {}", path.display());
            }
        }
        Commands::Counts => {
            let counts = store_counts(&cfg)?;
            tracing::info!("{}: {}", cfg.db_path.display(), counts);
        }
    }
    Ok(())
}
