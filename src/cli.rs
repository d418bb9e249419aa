//! # Command-Line Interface Module
//!
//! Clap definitions for the `nextrack` binary.
//!
//! ## Commands
//!
//! - `init-db`: Import a JSON catalog dump into the SQLite catalog database
//! - `recommend`: Pick the next track for one listening event
//! - `replay`: Replay a file of listening events
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! nextrack init-db dump.json
//! nextrack recommend --user 12 --prev-track 3051 --time 0.92
//! nextrack replay events.txt --seed 7
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "nextrack")]
#[command(about = "Nextrack: next-track selection by ensembling candidate lists")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that runs the engine.
#[derive(ClapArgs, Debug, Clone)]
pub struct EngineArgs {
    /// Catalog database path (defaults to the platform data directory)
    #[arg(long, env = "NEXTRACK_DB")]
    pub db: Option<PathBuf>,

    /// JSON engine configuration file
    #[arg(long, env = "NEXTRACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fixed random seed, overrides the configuration file
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Import a catalog dump into the catalog database
    ///
    /// The dump is a JSON object with `tracks`, `tracks_diverse`, `artists`,
    /// `user_based`, `latent_factor` and `top_tracks`. Missing sections are
    /// treated as empty.
    InitDb {
        /// Path to the JSON catalog dump
        dump: PathBuf,

        /// Catalog database path (defaults to the platform data directory)
        #[arg(long, env = "NEXTRACK_DB")]
        db: Option<PathBuf>,

        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Recommend the next track for one listening event
    Recommend {
        /// User id
        #[arg(long)]
        user: i64,

        /// Track the user just played
        #[arg(long)]
        prev_track: i64,

        /// Fraction of the previous track that was played, 0.0 to 1.0
        #[arg(long, default_value = "1.0")]
        time: f64,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Replay a file of `user prev_track time` events
    ///
    /// Prints `user prev_track next_track` for every event. Each user's
    /// history carries over between their events.
    Replay {
        /// Events file, one event per line
        events: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Generate shell completions
    ///
    /// Usage: nextrack completion bash > ~/.local/share/bash-completion/completions/nextrack
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
