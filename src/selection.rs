//! # Selection Policy
//!
//! Picks one track out of a vote tally:
//!
//! 1. Start from the fallback recommender's pick.
//! 2. Walk the tally from the highest count down; the first track that is a
//!    nearest neighbour of the previous track (`nn` only, not `nn_diverse`)
//!    and not yet in the listening history wins.
//! 3. Otherwise shuffle the `top_k` most voted tracks and take the first one
//!    not yet in the history.
//! 4. Otherwise keep the fallback pick.

use crate::catalog::TrackId;
use crate::session::ListeningHistory;
use crate::votes::VoteTally;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Which step of the policy produced the pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Most voted unseen nearest neighbour.
    Neighbour,
    /// Random unseen track from the most voted set.
    TopVoted,
    /// Every candidate already heard.
    Fallback,
}

/// Outcome of [`SelectionPolicy::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub track: TrackId,
    pub choice: Choice,
}

/// Priority, novelty and fallback rule.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    top_k: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

impl SelectionPolicy {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Choose the next track.
    ///
    /// # Arguments
    ///
    /// * `tally` - Votes over every candidate list
    /// * `neighbours` - The `nn` list of the previous track
    /// * `history` - Tracks already recommended to this user
    /// * `fallback` - The fallback recommender's pick, computed by the caller
    /// * `rng` - Drives the shuffle of the most voted set
    ///
    /// # Algorithm
    ///
    /// 1. **Neighbour priority**: walk the tally from most to least voted and
    ///    return the first unheard track that appears in `neighbours`.
    /// 2. **Shuffled top voted**: shuffle the `top_k` most voted tracks and
    ///    return the first one not in `history`.
    /// 3. **Fallback**: every candidate was heard, so `fallback` is returned
    ///    as is, even if it was heard too.
    ///
    /// The result is always either a tally entry or `fallback`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nextrack::selection::{Choice, SelectionPolicy};
    /// use nextrack::session::ListeningHistory;
    /// use nextrack::signals::RecommendationBundle;
    /// use nextrack::votes::VoteTally;
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let bundle = RecommendationBundle { nn: vec![5, 6], tp: vec![6, 7], ..Default::default() };
    /// let tally = VoteTally::from_bundle(&bundle);
    /// let history: ListeningHistory = [6].into_iter().collect();
    /// let mut rng = StdRng::seed_from_u64(1);
    ///
    /// // 6 has the most votes but was already heard
    /// let pick = SelectionPolicy::default().select(&tally, &bundle.nn, &history, 99, &mut rng);
    /// assert_eq!(pick.track, 5);
    /// assert_eq!(pick.choice, Choice::Neighbour);
    /// ```
    pub fn select<R: Rng + ?Sized>(
        &self,
        tally: &VoteTally,
        neighbours: &[TrackId],
        history: &ListeningHistory,
        fallback: TrackId,
        rng: &mut R,
    ) -> Selection {
        let neighbours: HashSet<TrackId> = neighbours.iter().copied().collect();

        let ranked = tally.ranked();
        if let Some(&(track, _)) = ranked
            .iter()
            .find(|(track, _)| neighbours.contains(track) && !history.contains(*track))
        {
            return Selection { track, choice: Choice::Neighbour };
        }

        let mut most_common: Vec<TrackId> =
            ranked.into_iter().take(self.top_k).map(|(track, _)| track).collect();
        most_common.shuffle(rng);

        match most_common.into_iter().find(|&track| !history.contains(track)) {
            Some(track) => Selection { track, choice: Choice::TopVoted },
            None => Selection { track: fallback, choice: Choice::Fallback },
        }
    }
}
