//! SQLite-backed catalog database.
//!
//! Each logical store lives in its own `(key, value)` table, so a single
//! database file holds the track index, the diverse track index, artist
//! track lists and both per-user recommendation sets. The popularity
//! ranking is kept in `top_tracks`.

use crate::catalog::{Catalog, CatalogDump, TrackId};
use crate::store::KvStore;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Logical tables of the catalog database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Tracks,
    TracksDiverse,
    Artists,
    UserBased,
    LatentFactor,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Tracks,
        Table::TracksDiverse,
        Table::Artists,
        Table::UserBased,
        Table::LatentFactor,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Table::Tracks => "tracks",
            Table::TracksDiverse => "tracks_diverse",
            Table::Artists => "artists",
            Table::UserBased => "recs_ub",
            Table::LatentFactor => "recs_lf",
        }
    }
}

/// Open (or create) the catalog database and make sure every table exists.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the schema cannot be created.
pub fn open(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open catalog database at {}", db_path.display()))?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<()> {
    for table in Table::ALL {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    key   INTEGER PRIMARY KEY,
                    value BLOB    NOT NULL
                )",
                table.name()
            ),
            [],
        )
        .with_context(|| format!("Failed to create table {}", table.name()))?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS top_tracks (
            rank  INTEGER PRIMARY KEY,
            track INTEGER NOT NULL
        )",
        [],
    )
    .context("Failed to create table top_tracks")?;

    Ok(())
}

/// Import a catalog dump into the database at `db_path`.
///
/// Without `force`, refuses to touch an existing file. With `force`, the
/// existing file is removed first.
///
/// # Errors
///
/// Returns an error if the database exists and `force` is not set, or if any
/// insert fails. The import runs in one transaction.
pub fn init_database(db_path: &Path, dump: &CatalogDump, force: bool) -> Result<()> {
    if db_path.exists() {
        if !force {
            bail!(
                "Database already exists at {}. Use --force to overwrite.",
                db_path.display()
            );
        }
        std::fs::remove_file(db_path)
            .with_context(|| format!("Failed to remove existing database {}", db_path.display()))?;
    }

    let mut conn = open(db_path)?;
    let tx = conn.transaction()?;

    {
        let insert = |table: Table, key: i64, value: Vec<u8>| -> Result<()> {
            tx.execute(
                &format!("INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)", table.name()),
                (key, value),
            )
            .with_context(|| format!("Failed to insert key {key} into {}", table.name()))?;
            Ok(())
        };

        for track in &dump.tracks {
            insert(Table::Tracks, track.track, Catalog::encode(track)?)?;
        }
        for track in &dump.tracks_diverse {
            insert(Table::TracksDiverse, track.track, Catalog::encode(track)?)?;
        }
        for (artist, tracks) in &dump.artists {
            insert(Table::Artists, *artist, Catalog::encode(tracks)?)?;
        }
        for (user, tracks) in &dump.user_based {
            insert(Table::UserBased, *user, Catalog::encode(tracks)?)?;
        }
        for (user, tracks) in &dump.latent_factor {
            insert(Table::LatentFactor, *user, Catalog::encode(tracks)?)?;
        }
        for (rank, track) in dump.top_tracks.iter().enumerate() {
            tx.execute(
                "INSERT INTO top_tracks (rank, track) VALUES (?1, ?2)",
                (rank as i64, track),
            )
            .context("Failed to insert popularity ranking")?;
        }
    }

    tx.commit().context("Committing catalog import failed")?;
    info!(
        "Imported {} tracks, {} artists, {} ranked tracks into {}",
        dump.tracks.len(),
        dump.artists.len(),
        dump.top_tracks.len(),
        db_path.display()
    );
    Ok(())
}

/// Load the static catalog data: popularity ranking and track universe.
///
/// # Errors
///
/// Returns an error if either query fails.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn
        .prepare("SELECT track FROM top_tracks ORDER BY rank")
        .context("Invalid SQL statement when SELECTing top tracks")?;
    let top_tracks = stmt
        .query_map([], |row| row.get::<_, TrackId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Cannot query top tracks")?;

    let mut stmt = conn
        .prepare("SELECT key FROM tracks ORDER BY key")
        .context("Invalid SQL statement when SELECTing track ids")?;
    let track_ids = stmt
        .query_map([], |row| row.get::<_, TrackId>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Cannot query track ids")?;

    debug!("Loaded catalog: {} tracks, {} ranked", track_ids.len(), top_tracks.len());
    Ok(Catalog::new(top_tracks, track_ids))
}

/// A single table of the catalog database exposed as a [`KvStore`].
///
/// Tables opened from the same database share one connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: Table,
}

impl SqliteStore {
    #[must_use]
    pub fn new(conn: Arc<Mutex<Connection>>, table: Table) -> Self {
        Self { conn, table }
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Catalog database connection lock poisoned"))?;
        conn.query_row(
            &format!("SELECT value FROM {} WHERE key = ?1", self.table.name()),
            [key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to query key {key} from {}", self.table.name()))
    }
}
