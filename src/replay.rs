//! Replay of recorded listening events through a recommender.
//!
//! Events file format: one event per line, `user prev_track engagement`,
//! whitespace separated. Blank lines and lines starting with `#` are ignored.
//!
//! Each user's events are replayed in file order; different users are
//! replayed in parallel.

use crate::catalog::{TrackId, UserId};
use crate::recommender::Recommender;
use anyhow::{bail, Context, Result};
use log::info;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// One recorded listening event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub user: UserId,
    pub prev_track: TrackId,
    pub engagement: f64,
}

/// An event together with the track the recommender picked for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub event: Event,
    pub next_track: TrackId,
}

/// Parse an events file.
///
/// # Errors
///
/// Returns an error naming the offending line if a line does not have exactly
/// three fields or a field does not parse.
pub fn parse_events(input: &str) -> Result<Vec<Event>> {
    let mut events = Vec::new();

    for (number, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [user, prev_track, engagement] = fields[..] else {
            bail!("Line {}: expected `user prev_track engagement`, got {line:?}", number + 1);
        };

        events.push(Event {
            user: user.parse().with_context(|| format!("Line {}: invalid user id", number + 1))?,
            prev_track: prev_track
                .parse()
                .with_context(|| format!("Line {}: invalid track id", number + 1))?,
            engagement: engagement
                .parse()
                .with_context(|| format!("Line {}: invalid engagement", number + 1))?,
        });
    }

    Ok(events)
}

/// Run every event through `recommender`, returning outcomes in input order.
pub fn replay(recommender: &dyn Recommender, events: &[Event]) -> Vec<Outcome> {
    let mut by_user: BTreeMap<UserId, Vec<usize>> = BTreeMap::new();
    for (position, event) in events.iter().enumerate() {
        by_user.entry(event.user).or_default().push(position);
    }
    info!("Replaying {} events for {} users", events.len(), by_user.len());

    let mut outcomes: Vec<(usize, Outcome)> = by_user
        .into_par_iter()
        .flat_map_iter(|(_, positions)| {
            positions
                .into_iter()
                .map(|position| {
                    let event = events[position];
                    let next_track =
                        recommender.recommend_next(event.user, event.prev_track, event.engagement);
                    (position, Outcome { event, next_track })
                })
                .collect::<Vec<_>>()
        })
        .collect();

    outcomes.sort_by_key(|(position, _)| *position);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}
