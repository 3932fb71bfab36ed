//! Command-line entry points
//!
//! Commands:
//! - `matchday run` - run every pipeline stage once
//! - `matchday score` - recalculate prediction points
//! - `matchday leaderboard` - print current standings or one user's history
//! - `matchday serve` - expose the cron trigger over HTTP
//! - `matchday migrate` - apply database migrations
//! - `matchday check-config` - validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Matchday prediction pipeline
#[derive(Parser, Debug)]
#[command(name = "matchday")]
#[command(author, version, about = "Fixture lifecycle, scoring and leaderboard pipeline")]
pub struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every pipeline stage once
    Run {
        /// Shared cron token
        #[arg(long, env = "MATCHDAY_CRON_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Run against an in-memory store loaded from this JSON file
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Recalculate prediction points
    Score {
        /// Only this fixture; every final fixture when omitted
        #[arg(long)]
        fixture: Option<i64>,

        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Print current standings without recording history
    Leaderboard {
        /// Print this user's recorded standings instead
        #[arg(long)]
        user: Option<Uuid>,

        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Serve the HTTP cron trigger
    Serve,

    /// Apply database migrations
    Migrate,

    /// Validate configuration and exit
    CheckConfig,
}
