//! # Integration Tests for Nextrack
//!
//! End-to-end behaviour of the ensemble recommender over in-memory and
//! SQLite-backed stores, plus a couple of CLI round trips.

use anyhow::Result;
use nextrack::catalog::{Catalog, CatalogDump, Track, TrackId, UserId};
use nextrack::config::EngineConfig;
use nextrack::engine::MostCommonRecommender;
use nextrack::recommender::{RandomRecommender, Recommender};
use nextrack::signals::SignalSources;
use nextrack::store::{KvStore, MemoryStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Store wrapper counting every lookup.
struct CountingStore {
    inner: MemoryStore,
    lookups: AtomicUsize,
}

impl CountingStore {
    fn new(inner: MemoryStore) -> Arc<Self> {
        Arc::new(Self { inner, lookups: AtomicUsize::new(0) })
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl KvStore for CountingStore {
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }
}

/// Backend that is always down.
struct UnavailableStore;

impl KvStore for UnavailableStore {
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        Err(anyhow::anyhow!("database is locked (key {key})"))
    }
}

/// Fallback returning a fresh id from a fixed range on every call and
/// remembering what it returned.
struct ScriptedFallback {
    next: AtomicUsize,
    returned: Mutex<Vec<TrackId>>,
}

impl ScriptedFallback {
    const BASE: TrackId = 900;

    fn new() -> Arc<Self> {
        Arc::new(Self { next: AtomicUsize::new(0), returned: Mutex::new(Vec::new()) })
    }

    fn last(&self) -> Option<TrackId> {
        self.returned.lock().unwrap().last().copied()
    }
}

impl Recommender for ScriptedFallback {
    fn recommend_next(&self, _user: UserId, _prev_track: TrackId, _engagement: f64) -> TrackId {
        let track = Self::BASE + (self.next.fetch_add(1, Ordering::SeqCst) % 50) as TrackId;
        self.returned.lock().unwrap().push(track);
        track
    }
}

fn track_record(track: TrackId, artist: i64, recommendations: Option<Vec<TrackId>>) -> Vec<u8> {
    Catalog::encode(&Track { track, artist, title: format!("track {track}"), recommendations }).unwrap()
}

fn list(tracks: &[TrackId]) -> Vec<u8> {
    Catalog::encode(&tracks.to_vec()).unwrap()
}

/// Small catalog:
/// - track 1 (artist 100) has neighbours [10, 11, 12], diverse neighbours [13, 14]
/// - track 2 (artist 100) has no neighbours
/// - track 3 is undecodable
/// - track 5 (artist 101) has neighbours [30], diverse neighbours [31]
/// - artist 100 has tracks [1, 2, 10]
/// - user 7: lf [10, 20, 21], ub [10, 22]
/// - user 9: lf [31, 31, 31]
/// - popularity: 20..=49 then 900..950
struct Fixture {
    tracks: Arc<CountingStore>,
    tracks_diverse: Arc<CountingStore>,
    artists: Arc<CountingStore>,
    user_based: Arc<CountingStore>,
    latent_factor: Arc<CountingStore>,
    catalog: Arc<Catalog>,
}

impl Fixture {
    fn new() -> Self {
        let tracks = MemoryStore::from_iter([
            (1, track_record(1, 100, Some(vec![10, 11, 12]))),
            (2, track_record(2, 100, None)),
            (3, b"not a record".to_vec()),
            (5, track_record(5, 101, Some(vec![30]))),
        ]);
        let diverse = MemoryStore::from_iter([
            (1, track_record(1, 100, Some(vec![13, 14]))),
            (5, track_record(5, 101, Some(vec![31]))),
        ]);
        let artists = MemoryStore::from_iter([(100, list(&[1, 2, 10]))]);
        let ub = MemoryStore::from_iter([(7, list(&[10, 22]))]);
        let lf = MemoryStore::from_iter([(7, list(&[10, 20, 21])), (9, list(&[31, 31, 31]))]);

        let top: Vec<TrackId> = (20..50).chain(900..950).collect();
        let universe: Vec<TrackId> = (1..50).chain(900..950).collect();

        Self {
            tracks: CountingStore::new(tracks),
            tracks_diverse: CountingStore::new(diverse),
            artists: CountingStore::new(artists),
            user_based: CountingStore::new(ub),
            latent_factor: CountingStore::new(lf),
            catalog: Arc::new(Catalog::new(top, universe)),
        }
    }

    fn sources(&self) -> SignalSources {
        SignalSources {
            tracks: self.tracks.clone(),
            tracks_diverse: self.tracks_diverse.clone(),
            artists: self.artists.clone(),
            user_based: self.user_based.clone(),
            latent_factor: self.latent_factor.clone(),
            catalog: Arc::clone(&self.catalog),
        }
    }

    fn total_lookups(&self) -> usize {
        [&self.tracks, &self.tracks_diverse, &self.artists, &self.user_based, &self.latent_factor]
            .iter()
            .map(|store| store.lookups())
            .sum()
    }

    fn engine(&self, seed: u64) -> MostCommonRecommender {
        let fallback = RandomRecommender::new(self.catalog.track_ids.clone(), seed);
        MostCommonRecommender::with_seed(self.sources(), Box::new(fallback), &EngineConfig::default(), seed)
    }

    fn engine_with_fallback(&self, fallback: Arc<ScriptedFallback>, seed: u64) -> MostCommonRecommender {
        MostCommonRecommender::with_seed(self.sources(), Box::new(fallback), &EngineConfig::default(), seed)
    }

    /// Engine built the way the binary builds it from a configured seed.
    fn configured_engine(&self, seed: u64) -> MostCommonRecommender {
        let config = EngineConfig { seed: Some(seed), ..EngineConfig::default() };
        let fallback = RandomRecommender::from_catalog(&self.catalog, Some(seed.wrapping_add(1)));
        MostCommonRecommender::new(self.sources(), Box::new(fallback), &config)
    }
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    #[test]
    fn test_top_voted_neighbour_is_deterministic() {
        let fixture = Fixture::new();
        // 10 gets votes from lf, ub, nn and sa; it is also a neighbour of 1
        for seed in 0..20 {
            let engine = fixture.engine(seed);
            assert_eq!(engine.recommend_next(7, 1, 1.0), 10, "seed {seed}");
        }
    }

    #[test]
    fn test_neighbours_are_walked_by_votes() {
        let fixture = Fixture::new();
        let engine = fixture.engine(3);

        assert_eq!(engine.recommend_next(7, 1, 1.0), 10);
        // 11 and 12 tie on one vote; first seen wins
        assert_eq!(engine.recommend_next(7, 1, 1.0), 11);
        assert_eq!(engine.recommend_next(7, 1, 1.0), 12);
    }

    #[test]
    fn test_diverse_neighbours_never_take_priority() {
        let fixture = Fixture::new();
        // user 9 after track 5: 31 has five votes (lf x3, nn_diverse, tp),
        // the nn neighbour 30 only two (nn, tp)
        for seed in 0..20 {
            let engine = fixture.engine(seed);
            assert_eq!(engine.recommend_next(9, 5, 1.0), 30, "seed {seed}");
        }
    }

    #[test]
    fn test_shuffled_pick_stays_in_top_ten() {
        let fixture = Fixture::new();
        // votes: 10 -> 4; 20, 21, 22 -> 2; the rest 1 in first-seen order
        let top_ten: HashSet<TrackId> = [10, 20, 21, 22, 11, 12, 13, 14, 23, 24].into_iter().collect();

        for seed in 0..100 {
            let engine = fixture.engine(seed);
            for _ in 0..3 {
                engine.recommend_next(7, 1, 1.0);
            }
            let pick = engine.recommend_next(7, 1, 1.0);
            assert!(top_ten.contains(&pick), "seed {seed} picked {pick}");
            assert!(![10, 11, 12].contains(&pick));
        }
    }

    #[test]
    fn test_everything_heard_returns_fallback() {
        let fixture = Fixture::new();
        let fallback = ScriptedFallback::new();
        let engine = fixture.engine_with_fallback(Arc::clone(&fallback), 1);

        // unknown user and track: only the popularity list votes, so the
        // top ten is 20..30 and ten calls exhaust it
        for _ in 0..10 {
            engine.recommend_next(8, 99, 1.0);
        }
        let mut heard = engine.history(8);
        heard.sort_unstable();
        assert_eq!(heard, (20..30).collect::<Vec<TrackId>>());

        for _ in 0..5 {
            let pick = engine.recommend_next(8, 99, 1.0);
            assert_eq!(Some(pick), fallback.last());
            assert!(pick >= ScriptedFallback::BASE);
        }
    }

    #[test]
    fn test_result_is_always_in_catalog() {
        let fixture = Fixture::new();
        let engine = fixture.engine(11);
        let universe: HashSet<TrackId> = fixture.catalog.track_ids.iter().copied().collect();

        for call in 0..300 {
            let prev = [1, 2, 3, 99][call % 4];
            let engagement = (call % 10) as f64 / 10.0;
            let pick = engine.recommend_next(7, prev, engagement);
            assert!(universe.contains(&pick), "call {call} picked {pick}");
        }
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    #[test]
    fn test_barely_played_track_performs_no_lookups() {
        let fixture = Fixture::new();
        let engine = fixture.engine(2);

        engine.recommend_next(7, 1, 1.0);
        let first = engine.cached_bundle(7).expect("bundle cached after first call");
        let lookups = fixture.total_lookups();
        assert!(lookups > 0);

        engine.recommend_next(7, 1, 0.2);
        assert_eq!(fixture.total_lookups(), lookups, "cached bundle must be reused");
        assert_eq!(engine.cached_bundle(7), Some(first));
    }

    #[test]
    fn test_threshold_is_strict() {
        let fixture = Fixture::new();
        let engine = fixture.engine(2);

        engine.recommend_next(7, 1, 1.0);
        let lookups = fixture.total_lookups();
        engine.recommend_next(7, 1, 0.75);
        assert!(fixture.total_lookups() > lookups, "0.75 is not below the threshold");
    }

    #[test]
    fn test_cache_is_per_user() {
        let fixture = Fixture::new();
        let engine = fixture.engine(2);

        engine.recommend_next(7, 1, 1.0);
        let lookups = fixture.total_lookups();
        engine.recommend_next(8, 1, 0.1);
        assert!(fixture.total_lookups() > lookups, "user 8 has no cached bundle yet");
    }

    #[test]
    fn test_history_grows_by_one_per_call() {
        let fixture = Fixture::new();
        let engine = fixture.engine(4);

        let mut picks = Vec::new();
        for k in 1..=60 {
            picks.push(engine.recommend_next(7, [1, 2][k % 2], 0.9));
            assert_eq!(engine.history(7).len(), k);
        }
        assert_eq!(engine.history(7), picks);
    }

    #[test]
    fn test_missing_and_broken_records_degrade_gracefully() {
        let fixture = Fixture::new();
        let engine = fixture.engine(6);

        // 3 is undecodable, 99 is absent: nn, nn_diverse and sa are empty
        engine.recommend_next(55, 3, 1.0);
        let bundle = engine.cached_bundle(55).unwrap();
        assert!(bundle.nn.is_empty() && bundle.nn_diverse.is_empty() && bundle.sa.is_empty());
        assert!(bundle.lf.is_empty() && bundle.ub.is_empty());
        assert_eq!(bundle.tp.len(), 80);

        engine.recommend_next(55, 99, 1.0);
        assert_eq!(engine.history(55).len(), 2);
    }

    #[test]
    fn test_unavailable_store_still_yields_a_track() {
        let fixture = Fixture::new();
        let mut sources = fixture.sources();
        sources.latent_factor = Arc::new(UnavailableStore);
        sources.user_based = Arc::new(UnavailableStore);
        let fallback = RandomRecommender::new(fixture.catalog.track_ids.clone(), 1);
        let engine = MostCommonRecommender::with_seed(sources, Box::new(fallback), &EngineConfig::default(), 1);

        // nn still wins without the user signals
        assert_eq!(engine.recommend_next(7, 1, 1.0), 10);
        let bundle = engine.cached_bundle(7).unwrap();
        assert!(bundle.lf.is_empty() && bundle.ub.is_empty());
        assert_eq!(bundle.nn, vec![10, 11, 12]);

        let universe: HashSet<TrackId> = fixture.catalog.track_ids.iter().copied().collect();
        for _ in 0..20 {
            assert!(universe.contains(&engine.recommend_next(7, 99, 1.0)));
        }
    }

    #[test]
    fn test_user_picks_do_not_depend_on_interleaving() {
        let fixture = Fixture::new();
        let alone = fixture.engine(12);
        let crowded = fixture.engine(12);

        // user 8 after unknown track 99 goes through the shuffle, then the fallback
        let solo: Vec<_> = (0..15).map(|_| alone.recommend_next(8, 99, 1.0)).collect();
        let mut interleaved = Vec::new();
        for other in 0..15 {
            crowded.recommend_next(100 + other, 99, 1.0);
            interleaved.push(crowded.recommend_next(8, 99, 1.0));
            crowded.recommend_next(7, 99, 1.0);
        }
        assert_eq!(solo, interleaved);
    }

    #[test]
    fn test_distinct_users_in_parallel() {
        let fixture = Fixture::new();
        let engine = Arc::new(fixture.engine(8));

        let handles: Vec<_> = (0..8)
            .map(|user| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        engine.recommend_next(user, 1, 1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for user in 0..8 {
            let history = engine.history(user);
            assert_eq!(history.len(), 25);
            assert_eq!(&history[..3], &[10, 11, 12]);
        }
    }
}

#[cfg(test)]
mod replay_tests {
    use super::*;
    use nextrack::replay::{self, Event};

    fn events() -> Vec<Event> {
        let mut events = Vec::new();
        for step in 0..20 {
            for user in 0..64 {
                events.push(Event {
                    user,
                    prev_track: [1, 2, 3, 5, 99][(user as usize + step) % 5],
                    engagement: ((user as usize * 7 + step) % 10) as f64 / 10.0,
                });
            }
        }
        events
    }

    fn seeded_run(fixture: &Fixture, pool: &rayon::ThreadPool) -> Vec<TrackId> {
        let engine = fixture.configured_engine(7);
        let events = events();
        pool.install(|| replay::replay(&engine, &events))
            .into_iter()
            .map(|outcome| outcome.next_track)
            .collect()
    }

    #[test]
    fn test_seeded_parallel_replay_is_reproducible() {
        let fixture = Fixture::new();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();

        let first = seeded_run(&fixture, &pool);
        assert_eq!(first.len(), 64 * 20);
        for run in 0..5 {
            assert_eq!(seeded_run(&fixture, &pool), first, "run {run} diverged");
        }
    }

    #[test]
    fn test_seeded_replay_matches_serial_calls() {
        let fixture = Fixture::new();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        let parallel = seeded_run(&fixture, &pool);

        let engine = fixture.configured_engine(7);
        let serial: Vec<_> = events()
            .iter()
            .map(|event| engine.recommend_next(event.user, event.prev_track, event.engagement))
            .collect();
        assert_eq!(parallel, serial);
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn write_dump(dir: &TempDir) -> Result<std::path::PathBuf> {
        let mut dump = CatalogDump {
            tracks: vec![
                Track { track: 1, artist: 5, title: "a".into(), recommendations: Some(vec![2, 3]) },
                Track { track: 2, artist: 5, title: "b".into(), recommendations: Some(vec![3]) },
                Track { track: 3, artist: 6, title: "c".into(), recommendations: None },
            ],
            top_tracks: vec![3, 2, 1],
            ..CatalogDump::default()
        };
        dump.artists.insert(5, vec![1, 2]);
        dump.user_based.insert(1, vec![3]);

        let path = dir.path().join("dump.json");
        std::fs::write(&path, serde_json::to_vec(&dump)?)?;
        Ok(path)
    }

    #[test]
    fn test_init_db_then_recommend() -> Result<()> {
        let dir = TempDir::new()?;
        let dump = write_dump(&dir)?;
        let db = dir.path().join("catalog.db");

        let status = Command::new(env!("CARGO_BIN_EXE_nextrack"))
            .args(["init-db", dump.to_str().unwrap(), "--db", db.to_str().unwrap()])
            .status()?;
        assert!(status.success());

        let output = Command::new(env!("CARGO_BIN_EXE_nextrack"))
            .args(["recommend", "--user", "1", "--prev-track", "1", "--time", "1.0"])
            .args(["--db", db.to_str().unwrap(), "--seed", "3"])
            .output()?;
        assert!(output.status.success());
        // 3 is a neighbour of 1 with votes from nn, ub and tp
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "3");
        Ok(())
    }

    #[test]
    fn test_replay_prints_one_line_per_event() -> Result<()> {
        let dir = TempDir::new()?;
        let dump = write_dump(&dir)?;
        let db = dir.path().join("catalog.db");
        nextrack::db::init_database(&db, &CatalogDump::load(&dump)?, false)?;

        let events = dir.path().join("events.txt");
        std::fs::write(&events, "1 1 1.0\n2 1 1.0\n1 3 0.1\n")?;

        let output = Command::new(env!("CARGO_BIN_EXE_nextrack"))
            .args(["replay", events.to_str().unwrap(), "--db", db.to_str().unwrap(), "--seed", "1"])
            .output()?;
        assert!(output.status.success());

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "1 1 3");
        assert_eq!(lines[1], "2 1 2");
        assert!(lines[2].starts_with("1 3 "));
        Ok(())
    }

    #[test]
    fn test_recommend_without_database_fails() -> Result<()> {
        let dir = TempDir::new()?;
        let output = Command::new(env!("CARGO_BIN_EXE_nextrack"))
            .args(["recommend", "--user", "1", "--prev-track", "1"])
            .args(["--db", dir.path().join("missing.db").to_str().unwrap()])
            .output()?;
        assert!(!output.status.success());
        Ok(())
    }
}
