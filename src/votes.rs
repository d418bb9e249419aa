//! Vote counting across candidate lists.
//!
//! Every occurrence of a track in any signal list is one vote. Tracks keep
//! the order in which they were first seen, which is also the tie-break
//! order for equal counts.

use crate::catalog::TrackId;
use crate::signals::RecommendationBundle;
use std::collections::HashMap;

/// Track id to vote count, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    counts: Vec<(TrackId, u32)>,
    index: HashMap<TrackId, usize>,
}

impl VoteTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally every list of `bundle`, in signal order.
    #[must_use]
    pub fn from_bundle(bundle: &RecommendationBundle) -> Self {
        let mut tally = Self::new();
        for (_, tracks) in bundle.iter() {
            tally.extend(tracks.iter().copied());
        }
        tally
    }

    /// Add one vote for `track`.
    pub fn add(&mut self, track: TrackId) {
        match self.index.get(&track) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(track, self.counts.len());
                self.counts.push((track, 1));
            }
        }
    }

    #[must_use]
    pub fn count(&self, track: TrackId) -> u32 {
        self.index.get(&track).map_or(0, |&slot| self.counts[slot].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// All tracks with their counts, highest count first.
    ///
    /// The sort is stable, so equal counts stay in first-seen order.
    #[must_use]
    pub fn ranked(&self) -> Vec<(TrackId, u32)> {
        let mut ranked = self.counts.clone();
        ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
        ranked
    }

    /// The `k` most voted tracks, highest count first.
    #[must_use]
    pub fn most_common(&self, k: usize) -> Vec<(TrackId, u32)> {
        let mut ranked = self.ranked();
        ranked.truncate(k);
        ranked
    }
}

impl Extend<TrackId> for VoteTally {
    fn extend<I: IntoIterator<Item = TrackId>>(&mut self, iter: I) {
        for track in iter {
            self.add(track);
        }
    }
}

impl FromIterator<TrackId> for VoteTally {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        let mut tally = Self::new();
        tally.extend(iter);
        tally
    }
}
