//! # Ensemble Engine
//!
//! [`MostCommonRecommender`] ties the pieces together for one call:
//!
//! 1. Lock the user's session.
//! 2. Reuse the cached bundle if the previous track was barely played,
//!    otherwise aggregate a fresh one.
//! 3. Tally votes and run the [`SelectionPolicy`] against the user's history,
//!    with the fallback recommender's pick as the default.
//! 4. Append the pick to the history and store the bundle back in the cache.

use crate::catalog::{TrackId, UserId};
use crate::config::EngineConfig;
use crate::recommender::{self, Recommender};
use crate::selection::SelectionPolicy;
use crate::session::{self, SessionRegistry};
use crate::signals::{RecommendationBundle, SignalAggregator, SignalSources};
use crate::votes::VoteTally;
use log::debug;

/// Next-track recommender that ensembles all candidate signals by vote.
pub struct MostCommonRecommender {
    aggregator: SignalAggregator,
    policy: SelectionPolicy,
    fallback: Box<dyn Recommender>,
    sessions: SessionRegistry,
    reuse_threshold: f64,
    seed: u64,
}

impl MostCommonRecommender {
    /// Build an engine seeded from `config.seed`, or from OS entropy when unset.
    #[must_use]
    pub fn new(sources: SignalSources, fallback: Box<dyn Recommender>, config: &EngineConfig) -> Self {
        Self::with_seed(sources, fallback, config, recommender::resolve_seed(config.seed))
    }

    /// Build an engine with an explicit base seed for the per-user shuffle streams.
    #[must_use]
    pub fn with_seed(
        sources: SignalSources,
        fallback: Box<dyn Recommender>,
        config: &EngineConfig,
        seed: u64,
    ) -> Self {
        Self {
            aggregator: SignalAggregator::new(sources, config.top_tracks_limit),
            policy: SelectionPolicy::new(config.top_k),
            fallback,
            sessions: SessionRegistry::new(),
            reuse_threshold: config.reuse_threshold,
            seed,
        }
    }

    /// Tracks recommended to `user` so far, in order.
    #[must_use]
    pub fn history(&self, user: UserId) -> Vec<TrackId> {
        self.sessions
            .get(user)
            .map(|handle| {
                let state = session::lock(&handle);
                state.history.as_slice().to_vec()
            })
            .unwrap_or_default()
    }

    /// The bundle cached for `user` by the last call, if any.
    #[must_use]
    pub fn cached_bundle(&self, user: UserId) -> Option<RecommendationBundle> {
        self.sessions
            .get(user)
            .and_then(|handle| {
                let state = session::lock(&handle);
                state.cached.clone()
            })
    }
}

impl Recommender for MostCommonRecommender {
    /// Pick the next track for `user` by ensemble vote.
    ///
    /// The call holds the user's session lock from start to finish, so calls
    /// for the same user are serialized. Calls for different users only share
    /// the read-only stores.
    ///
    /// # Arguments
    ///
    /// * `user` - Listener the pick is for
    /// * `prev_track` - Track that just finished or was skipped
    /// * `engagement` - Played fraction of `prev_track`, nominally in `[0, 1]`
    ///
    /// # Behavior
    ///
    /// - **Engagement below the reuse threshold (0.75 by default)**: the
    ///   bundle cached by the previous call is reused and no store is read.
    ///   The threshold is strict, and the first call for a user always
    ///   aggregates.
    /// - **Otherwise**: a fresh bundle is aggregated for `(user, prev_track)`.
    /// - The fallback recommender is consulted on every call, then the
    ///   [`SelectionPolicy`] picks between the nearest neighbours, the
    ///   shuffled top voted set and the fallback pick.
    /// - The pick is appended to the history and the bundle becomes the new
    ///   cache entry, whether it was fresh or reused.
    ///
    /// # Returns
    ///
    /// Always a track id. Store failures degrade to empty signals.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use nextrack::catalog::{Catalog, Track};
    /// use nextrack::config::EngineConfig;
    /// use nextrack::engine::MostCommonRecommender;
    /// use nextrack::recommender::{Recommender, TopPopRecommender};
    /// use nextrack::signals::SignalSources;
    /// use nextrack::store::MemoryStore;
    ///
    /// let record = |track, recs: Vec<i64>| {
    ///     let track = Track { track, artist: 1, title: String::new(), recommendations: Some(recs) };
    ///     (track.track, Catalog::encode(&track).unwrap())
    /// };
    /// let sources = SignalSources {
    ///     tracks: Arc::new(MemoryStore::from_iter([record(1, vec![2, 3]), record(2, vec![4])])),
    ///     tracks_diverse: Arc::new(MemoryStore::new()),
    ///     artists: Arc::new(MemoryStore::new()),
    ///     user_based: Arc::new(MemoryStore::new()),
    ///     latent_factor: Arc::new(MemoryStore::new()),
    ///     catalog: Arc::new(Catalog::new(vec![], vec![1, 2, 3, 4])),
    /// };
    /// let config = EngineConfig { seed: Some(1), ..EngineConfig::default() };
    /// let engine = MostCommonRecommender::new(sources, Box::new(TopPopRecommender::new(vec![1])), &config);
    ///
    /// assert_eq!(engine.recommend_next(42, 1, 1.0), 2);
    /// // track 2 was barely played: the neighbours of track 1 are reused
    /// assert_eq!(engine.recommend_next(42, 2, 0.3), 3);
    /// assert_eq!(engine.history(42), vec![2, 3]);
    /// ```
    fn recommend_next(&self, user: UserId, prev_track: TrackId, engagement: f64) -> TrackId {
        let handle = self.sessions.handle(user);
        let mut guard = session::lock(&handle);
        let state = &mut *guard;

        let bundle = match state.cached.take() {
            Some(cached) if engagement < self.reuse_threshold => {
                debug!("user {user}: previous track played {engagement:.2}, reusing cached bundle");
                cached
            }
            _ => self.aggregator.aggregate(user, prev_track),
        };

        let tally = VoteTally::from_bundle(&bundle);
        let fallback = self.fallback.recommend_next(user, prev_track, engagement);

        let seed = self.seed;
        let rng = state.rng.get_or_insert_with(|| recommender::user_rng(seed, user));
        let selection = self.policy.select(&tally, &bundle.nn, &state.history, fallback, rng);
        debug!(
            "user {user}: picked {} via {:?} from {} candidates",
            selection.track,
            selection.choice,
            tally.len()
        );

        state.history.push(selection.track);
        state.cached = Some(bundle);
        selection.track
    }
}
