//! Next-track selection for a music recommendation service.
//!
//! Given a user, the track they just finished (or abandoned) and how much of
//! it they played, the engine picks the next track by letting several
//! independently computed candidate lists vote.
//!
//! Core modules:
//! - [`signals`] - Candidate list aggregation (`lf`, `ub`, `nn`, `nn_diverse`, `tp`, `sa`)
//! - [`votes`] - Vote tally across candidate lists
//! - [`selection`] - Priority, novelty and fallback rule
//! - [`session`] - Per-user listening history and bundle cache
//! - [`engine`] - The ensemble recommender wiring it all together
//! - [`recommender`] - The `Recommender` trait and fallback strategies
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - Track records and the shared byte codec
//! - [`store`] - Key-value store trait and in-memory store
//! - [`db`] - SQLite-backed stores and catalog import
//! - [`config`] - Engine configuration and data directory management
//! - [`replay`] - Replaying recorded listening events
//! - [`cli`] / [`completion`] - Command-line interface
//!
//! ## Quick Start Example
//!
//! ```
//! use std::sync::Arc;
//! use nextrack::catalog::{Catalog, Track};
//! use nextrack::config::EngineConfig;
//! use nextrack::engine::MostCommonRecommender;
//! use nextrack::recommender::{RandomRecommender, Recommender};
//! use nextrack::signals::SignalSources;
//! use nextrack::store::MemoryStore;
//!
//! let mut tracks = MemoryStore::new();
//! let record = Track { track: 1, artist: 7, title: "Intro".into(), recommendations: Some(vec![2, 3]) };
//! tracks.insert(1, Catalog::encode(&record)?);
//!
//! let catalog = Arc::new(Catalog::new(vec![3, 2, 1], vec![1, 2, 3]));
//! let sources = SignalSources {
//!     tracks: Arc::new(tracks),
//!     tracks_diverse: Arc::new(MemoryStore::new()),
//!     artists: Arc::new(MemoryStore::new()),
//!     user_based: Arc::new(MemoryStore::new()),
//!     latent_factor: Arc::new(MemoryStore::new()),
//!     catalog: Arc::clone(&catalog),
//! };
//!
//! let config = EngineConfig { seed: Some(1), ..EngineConfig::default() };
//! let fallback = RandomRecommender::from_catalog(&catalog, config.seed);
//! let engine = MostCommonRecommender::new(sources, Box::new(fallback), &config);
//!
//! let next = engine.recommend_next(42, 1, 0.9);
//! assert!(next == 2 || next == 3);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Lookups that miss, fail, or return undecodable bytes count as empty
//! signals, so `recommend_next` never fails. Database import, configuration
//! loading and the CLI return `anyhow::Result`.
//!
//! ## Logging
//!
//! Uses the `log` facade. The binary initializes `env_logger`, so
//! `RUST_LOG=nextrack=debug` shows which selection path won for each call.

pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod engine;
pub mod recommender;
pub mod replay;
pub mod selection;
pub mod session;
pub mod signals;
pub mod store;
pub mod votes;
