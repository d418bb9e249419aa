//! Per-user state: listening history, the cached recommendation bundle and
//! the user's random stream.
//!
//! Each user gets one [`UserSession`] behind its own mutex. A call for a user
//! holds that lock for its whole duration, so calls for the same user are
//! serialized while calls for different users run independently.

use crate::catalog::{TrackId, UserId};
use crate::signals::RecommendationBundle;
use rand::rngs::StdRng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Append-only record of tracks already recommended to a user.
#[derive(Debug, Clone, Default)]
pub struct ListeningHistory {
    tracks: Vec<TrackId>,
    seen: HashSet<TrackId>,
}

impl ListeningHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, track: TrackId) {
        self.tracks.push(track);
        self.seen.insert(track);
    }

    #[must_use]
    pub fn contains(&self, track: TrackId) -> bool {
        self.seen.contains(&track)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks in the order they were recommended, duplicates included.
    #[must_use]
    pub fn as_slice(&self) -> &[TrackId] {
        &self.tracks
    }
}

impl FromIterator<TrackId> for ListeningHistory {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        let mut history = Self::new();
        for track in iter {
            history.push(track);
        }
        history
    }
}

/// Everything the engine remembers about one user.
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    pub history: ListeningHistory,
    /// Single-slot cache of the last bundle used for this user.
    pub cached: Option<RecommendationBundle>,
    /// Shuffle stream for this user, created on the first call.
    pub rng: Option<StdRng>,
}

/// Shared handle to one user's session.
pub type SessionHandle = Arc<Mutex<UserSession>>;

/// Registry of per-user sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, SessionHandle>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The session handle for `user`, created empty on first use.
    ///
    /// The registry lock is only held while looking up the handle.
    #[must_use]
    pub fn handle(&self, user: UserId) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(user).or_default())
    }

    /// Existing session for `user`, without creating one.
    #[must_use]
    pub fn get(&self, user: UserId) -> Option<SessionHandle> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&user).map(Arc::clone)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a session, recovering the data if a previous holder panicked.
///
/// Session state only ever grows by whole entries, so a poisoned lock still
/// holds consistent data.
pub fn lock(session: &Mutex<UserSession>) -> MutexGuard<'_, UserSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
