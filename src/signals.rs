//! # Signal Aggregation
//!
//! Collects the six candidate lists that feed a recommendation:
//!
//! - `lf`: latent-factor recommendations for the user
//! - `ub`: user-based recommendations for the user
//! - `nn`: nearest neighbours of the previous track
//! - `nn_diverse`: nearest neighbours from the diverse index
//! - `tp`: global popularity ranking
//! - `sa`: other tracks by the previous track's artist
//!
//! A lookup that misses, fails, or returns undecodable bytes contributes an
//! empty list. Aggregation itself never fails.

use crate::catalog::{ArtistId, Catalog, Track, TrackId, UserId};
use crate::store::KvStore;
use log::{trace, warn};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// Names of the candidate signals, in tally order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Lf,
    Ub,
    Nn,
    NnDiverse,
    Tp,
    Sa,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::Lf,
        Signal::Ub,
        Signal::Nn,
        Signal::NnDiverse,
        Signal::Tp,
        Signal::Sa,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Signal::Lf => "lf",
            Signal::Ub => "ub",
            Signal::Nn => "nn",
            Signal::NnDiverse => "nn_diverse",
            Signal::Tp => "tp",
            Signal::Sa => "sa",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate list per signal. Lists may be empty but are never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecommendationBundle {
    pub lf: Vec<TrackId>,
    pub ub: Vec<TrackId>,
    pub nn: Vec<TrackId>,
    pub nn_diverse: Vec<TrackId>,
    pub tp: Vec<TrackId>,
    pub sa: Vec<TrackId>,
}

impl RecommendationBundle {
    #[must_use]
    pub fn get(&self, signal: Signal) -> &[TrackId] {
        match signal {
            Signal::Lf => &self.lf,
            Signal::Ub => &self.ub,
            Signal::Nn => &self.nn,
            Signal::NnDiverse => &self.nn_diverse,
            Signal::Tp => &self.tp,
            Signal::Sa => &self.sa,
        }
    }

    /// Every signal with its list, in [`Signal::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Signal, &[TrackId])> + '_ {
        Signal::ALL.into_iter().map(move |signal| (signal, self.get(signal)))
    }

    /// Total number of candidate occurrences across all lists.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.iter().map(|(_, tracks)| tracks.len()).sum()
    }
}

/// The lookup stores and static catalog data behind the signals.
#[derive(Clone)]
pub struct SignalSources {
    pub tracks: Arc<dyn KvStore>,
    pub tracks_diverse: Arc<dyn KvStore>,
    pub artists: Arc<dyn KvStore>,
    pub user_based: Arc<dyn KvStore>,
    pub latent_factor: Arc<dyn KvStore>,
    pub catalog: Arc<Catalog>,
}

/// Builds fresh [`RecommendationBundle`]s from [`SignalSources`].
pub struct SignalAggregator {
    sources: SignalSources,
    top_tracks_limit: usize,
}

impl SignalAggregator {
    #[must_use]
    pub fn new(sources: SignalSources, top_tracks_limit: usize) -> Self {
        Self { sources, top_tracks_limit }
    }

    /// Look up all six signals for one `(user, prev_track)` context.
    ///
    /// The previous track's record is read once: its `recommendations` give
    /// `nn` and its artist id keys the `sa` lookup. `nn_diverse` comes from
    /// the independent diverse index, `lf` and `ub` are keyed by user, and
    /// `tp` is the first `top_tracks_limit` entries of the popularity ranking.
    ///
    /// # Failure Handling
    ///
    /// Each lookup fails closed. A missing key, a store error or bytes that
    /// do not decode give an empty list for the affected signal only. Errors
    /// and undecodable records are logged at `warn`. The other signals are
    /// still filled, so this method never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use nextrack::catalog::{Catalog, Track};
    /// use nextrack::signals::{SignalAggregator, SignalSources};
    /// use nextrack::store::MemoryStore;
    ///
    /// let intro = Track { track: 1, artist: 7, title: "Intro".into(), recommendations: Some(vec![2, 3]) };
    /// let mut tracks = MemoryStore::new();
    /// tracks.insert(1, Catalog::encode(&intro)?);
    /// let mut artists = MemoryStore::new();
    /// artists.insert(7, Catalog::encode(&vec![1, 4])?);
    ///
    /// let aggregator = SignalAggregator::new(
    ///     SignalSources {
    ///         tracks: Arc::new(tracks),
    ///         tracks_diverse: Arc::new(MemoryStore::new()),
    ///         artists: Arc::new(artists),
    ///         user_based: Arc::new(MemoryStore::new()),
    ///         latent_factor: Arc::new(MemoryStore::new()),
    ///         catalog: Arc::new(Catalog::new(vec![3, 2, 1], vec![1, 2, 3, 4])),
    ///     },
    ///     2,
    /// );
    ///
    /// let bundle = aggregator.aggregate(42, 1);
    /// assert_eq!(bundle.nn, vec![2, 3]);
    /// assert_eq!(bundle.sa, vec![1, 4]);
    /// assert_eq!(bundle.tp, vec![3, 2]);
    /// assert!(bundle.lf.is_empty() && bundle.ub.is_empty() && bundle.nn_diverse.is_empty());
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    #[must_use]
    pub fn aggregate(&self, user: UserId, prev_track: TrackId) -> RecommendationBundle {
        let prev = self.lookup::<Track>(&*self.sources.tracks, prev_track, "tracks");

        let bundle = RecommendationBundle {
            lf: self.user_list(&*self.sources.latent_factor, user, "latent_factor"),
            ub: self.user_list(&*self.sources.user_based, user, "user_based"),
            nn: prev
                .as_ref()
                .and_then(|track| track.recommendations.clone())
                .unwrap_or_default(),
            nn_diverse: self.neighbours(&*self.sources.tracks_diverse, prev_track, "tracks_diverse"),
            tp: self.sources.catalog.top(self.top_tracks_limit).to_vec(),
            sa: prev
                .map(|track| self.artist_tracks(track.artist))
                .unwrap_or_default(),
        };

        for (signal, tracks) in bundle.iter() {
            trace!("user {user}, prev {prev_track}: {signal} has {} candidates", tracks.len());
        }
        bundle
    }

    fn user_list(&self, store: &dyn KvStore, user: UserId, label: &str) -> Vec<TrackId> {
        self.lookup::<Vec<TrackId>>(store, user, label).unwrap_or_default()
    }

    fn neighbours(&self, store: &dyn KvStore, track: TrackId, label: &str) -> Vec<TrackId> {
        self.lookup::<Track>(store, track, label)
            .and_then(|track| track.recommendations)
            .unwrap_or_default()
    }

    fn artist_tracks(&self, artist: ArtistId) -> Vec<TrackId> {
        self.lookup::<Vec<TrackId>>(&*self.sources.artists, artist, "artists")
            .unwrap_or_default()
    }

    /// Fetch and decode one record, failing closed on any error.
    fn lookup<T: DeserializeOwned>(&self, store: &dyn KvStore, key: i64, label: &str) -> Option<T> {
        let bytes = match store.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Lookup of key {key} in {label} failed, treating as missing: {e:#}");
                return None;
            }
        };

        match Catalog::decode(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Undecodable record for key {key} in {label}, treating as missing: {e:#}");
                None
            }
        }
    }
}
