pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod leaderboard;
pub mod lifecycle;
pub mod pipeline;
pub mod scoring;
pub mod store;

pub use adapters::PostgresStore;
pub use config::AppConfig;
pub use domain::{
    Fixture, FixtureId, FixtureStatus, HistoryRecord, LeaderboardEntry, Outcome, Prediction,
    RankedEntry, RebuildSummary, Score, SpecialLock, SpecialPrediction, TeamId, UserId,
};
pub use error::{MatchdayError, Result};
pub use leaderboard::{LeaderboardAggregator, LeaderboardReport};
pub use lifecycle::{LifecycleConfig, LifecycleManager, LifecycleReport, LockOutcome};
pub use pipeline::{
    CronAuth, FixtureSync, NoopSync, Orchestrator, PipelineReport, Stage, StageReport,
};
pub use scoring::{score_prediction, ScoringEngine, ScoringReport};
pub use store::{MemoryStore, SeedData, Store};
