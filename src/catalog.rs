//! # Catalog Module
//!
//! Track records and the shared byte codec used by every store.
//!
//! All values held in the key-value stores are JSON-encoded bytes. A track
//! record carries its artist and, optionally, a list of similar tracks
//! produced by the nearest-neighbour index. Artist records and per-user
//! recommendation records are plain lists of track ids.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Track identifier.
pub type TrackId = i64;
/// User identifier.
pub type UserId = i64;
/// Artist identifier.
pub type ArtistId = i64;

/// Decoded track record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub track: TrackId,
    pub artist: ArtistId,
    #[serde(default)]
    pub title: String,
    /// Similar tracks, most similar first. `None` when the index has no entry.
    #[serde(default)]
    pub recommendations: Option<Vec<TrackId>>,
}

/// Static catalog data that lives for the whole process.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Global popularity ranking, most popular first.
    pub top_tracks: Vec<TrackId>,
    /// Every track id known to the catalog.
    pub track_ids: Vec<TrackId>,
}

impl Catalog {
    #[must_use]
    pub fn new(top_tracks: Vec<TrackId>, track_ids: Vec<TrackId>) -> Self {
        Self { top_tracks, track_ids }
    }

    /// Decode a stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding of `T`.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).context("Failed to decode catalog record")
    }

    /// Encode a record for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).context("Failed to encode catalog record")
    }

    /// The first `limit` entries of the popularity ranking.
    #[must_use]
    pub fn top(&self, limit: usize) -> &[TrackId] {
        &self.top_tracks[..limit.min(self.top_tracks.len())]
    }
}

/// On-disk catalog dump consumed by `nextrack init-db`.
///
/// Map keys are stringified ids since JSON object keys are always strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub tracks_diverse: Vec<Track>,
    #[serde(default)]
    pub artists: BTreeMap<ArtistId, Vec<TrackId>>,
    #[serde(default)]
    pub user_based: BTreeMap<UserId, Vec<TrackId>>,
    #[serde(default)]
    pub latent_factor: BTreeMap<UserId, Vec<TrackId>>,
    #[serde(default)]
    pub top_tracks: Vec<TrackId>,
}

impl CatalogDump {
    /// Read a dump from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid dump.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)
            .with_context(|| format!("Failed to read catalog dump at {}", path.display()))?;
        serde_json::from_slice(&raw)
            .with_context(|| format!("Invalid catalog dump in {}", path.display()))
    }
}
