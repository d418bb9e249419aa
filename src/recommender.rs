//! The `Recommender` capability and the simple fallback strategies.
//!
//! Every strategy, including the ensemble engine, answers the same question:
//! given a user, their previous track and how much of it they played, which
//! track comes next. Implementations must always produce an answer.

use crate::catalog::{Catalog, TrackId, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Next-track recommendation strategy.
pub trait Recommender: Send + Sync {
    /// Pick the track to play after `prev_track`.
    ///
    /// `engagement` is the played fraction of `prev_track`, in `[0, 1]`.
    fn recommend_next(&self, user: UserId, prev_track: TrackId, engagement: f64) -> TrackId;
}

impl<R: Recommender + ?Sized> Recommender for Arc<R> {
    fn recommend_next(&self, user: UserId, prev_track: TrackId, engagement: f64) -> TrackId {
        (**self).recommend_next(user, prev_track, engagement)
    }
}

impl<R: Recommender + ?Sized> Recommender for Box<R> {
    fn recommend_next(&self, user: UserId, prev_track: TrackId, engagement: f64) -> TrackId {
        (**self).recommend_next(user, prev_track, engagement)
    }
}

/// The configured seed, or a fresh one from OS entropy.
#[must_use]
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Random stream for one user, derived from a base seed.
///
/// Each user draws from their own stream, so a user's picks depend only on
/// the base seed and that user's own calls, never on how calls for different
/// users interleave.
#[must_use]
pub fn user_rng(seed: u64, user: UserId) -> StdRng {
    // golden-ratio multiplier spreads adjacent user ids across the seed space
    StdRng::seed_from_u64(seed ^ (user as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Uniformly random track from the catalog.
#[derive(Debug)]
pub struct RandomRecommender {
    universe: Vec<TrackId>,
    seed: u64,
    streams: Mutex<HashMap<UserId, StdRng>>,
}

impl RandomRecommender {
    #[must_use]
    pub fn new(universe: Vec<TrackId>, seed: u64) -> Self {
        Self { universe, seed, streams: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn from_catalog(catalog: &Catalog, seed: Option<u64>) -> Self {
        Self::new(catalog.track_ids.clone(), resolve_seed(seed))
    }
}

impl Recommender for RandomRecommender {
    /// With an empty catalog there is nothing to draw from, so the previous
    /// track is returned.
    fn recommend_next(&self, user: UserId, prev_track: TrackId, _engagement: f64) -> TrackId {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        let rng = streams.entry(user).or_insert_with(|| user_rng(self.seed, user));
        self.universe.choose(rng).copied().unwrap_or(prev_track)
    }
}

/// Always the most popular track that differs from the previous one.
#[derive(Debug, Clone)]
pub struct TopPopRecommender {
    top_tracks: Vec<TrackId>,
}

impl TopPopRecommender {
    #[must_use]
    pub fn new(top_tracks: Vec<TrackId>) -> Self {
        Self { top_tracks }
    }
}

impl Recommender for TopPopRecommender {
    fn recommend_next(&self, _user: UserId, prev_track: TrackId, _engagement: f64) -> TrackId {
        self.top_tracks
            .iter()
            .copied()
            .find(|&track| track != prev_track)
            .or_else(|| self.top_tracks.first().copied())
            .unwrap_or(prev_track)
    }
}
