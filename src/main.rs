//! # Nextrack
//!
//! Command-line front end for the next-track selection engine.
//!
//! ## Usage
//!
//! ```bash
//! # Import a catalog dump
//! nextrack init-db dump.json
//!
//! # One recommendation
//! nextrack recommend --user 12 --prev-track 3051 --time 0.92
//!
//! # Replay recorded listening sessions
//! nextrack replay events.txt --seed 7
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use nextrack::catalog::CatalogDump;
use nextrack::cli::{self, EngineArgs};
use nextrack::config::{self, EngineConfig};
use nextrack::db::{self, SqliteStore, Table};
use nextrack::engine::MostCommonRecommender;
use nextrack::recommender::{RandomRecommender, Recommender};
use nextrack::signals::SignalSources;
use nextrack::{completion, replay};
use path_absolutize::Absolutize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Resolve the catalog database path: explicit flag or platform default.
fn resolve_db_path(db: Option<PathBuf>) -> Result<PathBuf> {
    let path = match db {
        Some(path) => path,
        None => config::get_db_path()?,
    };
    Ok(path
        .absolutize()
        .with_context(|| format!("Cannot resolve database path {}", path.display()))?
        .into_owned())
}

/// Open the catalog database and build the ensemble engine over it.
fn build_engine(args: &EngineArgs) -> Result<MostCommonRecommender> {
    let engine_config =
        EngineConfig::load_or_default(args.config.as_deref())?.with_seed(args.seed);
    debug!("Engine configuration: {engine_config:?}");

    let db_path = resolve_db_path(args.db.clone())?;
    if !db_path.exists() {
        anyhow::bail!(
            "No catalog database at {}. Run `nextrack init-db <dump>` first.",
            db_path.display()
        );
    }

    let conn = db::open(&db_path)?;
    let catalog = Arc::new(db::load_catalog(&conn)?);
    info!(
        "Loaded catalog from {}: {} tracks",
        db_path.display(),
        catalog.track_ids.len()
    );

    let conn = Arc::new(Mutex::new(conn));
    let table = |table: Table| Arc::new(SqliteStore::new(Arc::clone(&conn), table));
    let sources = SignalSources {
        tracks: table(Table::Tracks),
        tracks_diverse: table(Table::TracksDiverse),
        artists: table(Table::Artists),
        user_based: table(Table::UserBased),
        latent_factor: table(Table::LatentFactor),
        catalog: Arc::clone(&catalog),
    };

    // fallback draws come from a separate stream from the shuffle
    let fallback_seed = engine_config.seed.map(|seed| seed.wrapping_add(1));
    let fallback = RandomRecommender::from_catalog(&catalog, fallback_seed);

    Ok(MostCommonRecommender::new(sources, Box::new(fallback), &engine_config))
}

/// Main entry point for the nextrack binary.
///
/// Logging is controlled via `RUST_LOG`, for example
/// `RUST_LOG=nextrack=debug nextrack replay events.txt`.
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::InitDb { dump, db: db_flag, force } => {
            let db_path = resolve_db_path(db_flag)?;
            info!("Importing catalog dump {} into {}", dump.display(), db_path.display());
            let dump = CatalogDump::load(&dump)?;
            db::init_database(&db_path, &dump, force)?;
            println!("Catalog database written to {}", db_path.display());
        }
        cli::Command::Recommend { user, prev_track, time, engine } => {
            let engine = build_engine(&engine)?;
            println!("{}", engine.recommend_next(user, prev_track, time));
        }
        cli::Command::Replay { events, engine } => {
            let engine = build_engine(&engine)?;
            let raw = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read events file {}", events.display()))?;
            let events = replay::parse_events(&raw)?;

            for outcome in replay::replay(&engine, &events) {
                println!(
                    "{} {} {}",
                    outcome.event.user, outcome.event.prev_track, outcome.next_track
                );
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}
