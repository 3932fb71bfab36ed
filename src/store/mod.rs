//! Storage seams
//!
//! Each entity is reached through a small async repository trait so the
//! lifecycle, scoring and leaderboard components never see a query builder.
//! Batch transitions are expressed as predicates ("lock every scheduled
//! fixture kicking off before X"), never as read-then-write loops, so a
//! relational backend can issue each one as a single statement.
//!
//! Backends:
//! - [`MemoryStore`]: in-process, seedable from JSON, used for tests and local runs
//! - [`crate::adapters::PostgresStore`]: production backend on sqlx

pub mod memory;

pub use memory::{MemoryStore, SeedData, WriteCounts};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::domain::{
    Fixture, FixtureId, HistoryRecord, LeaderboardEntry, Prediction, RebuildSummary, ScoreUpdate,
    SpecialLock, TeamId, UserId,
};
use crate::error::{MatchdayError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FixtureRepository: Send + Sync {
    async fn get_fixture(&self, id: FixtureId) -> Result<Option<Fixture>>;

    /// Lock every scheduled, unlocked fixture with `kickoff_at <= cutoff`.
    /// Returns the ids that changed.
    async fn lock_kicking_off_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<FixtureId>>;

    /// Move every scheduled fixture with `kickoff_at <= now` to live.
    async fn promote_kicked_off(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>>;

    /// Move every live fixture with a complete score and
    /// `kickoff_at <= kicked_off_before` to final.
    async fn finalize_scored(&self, kicked_off_before: DateTime<Utc>) -> Result<Vec<FixtureId>>;

    /// Earliest kickoff across all fixtures
    async fn earliest_kickoff(&self) -> Result<Option<DateTime<Utc>>>;

    /// Earliest kickoff of a fixture the team plays in, on either side
    async fn earliest_kickoff_for_team(&self, team_id: TeamId) -> Result<Option<DateTime<Utc>>>;

    /// Every final fixture, ordered by kickoff
    async fn final_fixtures(&self) -> Result<Vec<Fixture>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    async fn predictions_for_fixture(&self, fixture_id: FixtureId) -> Result<Vec<Prediction>>;

    /// Persist awards in one batch. Returns the number of rows written.
    async fn apply_scores(&self, updates: Vec<ScoreUpdate>) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpecialPredictionRepository: Send + Sync {
    /// Set the latch on every special prediction that does not have it yet.
    /// Returns the number of rows that changed.
    async fn set_lock(&self, lock: SpecialLock) -> Result<u64>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeaderboardRepository: Send + Sync {
    /// Recompute every entry from scored predictions. Predictions whose
    /// fixture is missing are counted, not aggregated.
    async fn rebuild_totals(&self) -> Result<RebuildSummary>;

    /// All entries, read from one consistent snapshot
    async fn snapshot_entries(&self) -> Result<Vec<LeaderboardEntry>>;

    /// Position of each user in their most recent history record
    async fn latest_positions(&self) -> Result<HashMap<UserId, u32>>;

    /// Append records; existing history is never touched
    async fn append_history(&self, records: Vec<HistoryRecord>) -> Result<u64>;

    async fn history_for_user(&self, user_id: UserId) -> Result<Vec<HistoryRecord>>;
}

/// Everything the pipeline needs from one backend
pub trait Store:
    FixtureRepository + PredictionRepository + SpecialPredictionRepository + LeaderboardRepository
{
}

impl<T> Store for T where
    T: FixtureRepository
        + PredictionRepository
        + SpecialPredictionRepository
        + LeaderboardRepository
{
}

/// Run a store call with an upper bound on its duration.
///
/// Expiry is reported as [`MatchdayError::Timeout`]; the call is not retried.
pub async fn bounded<T, F>(timeout: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MatchdayError::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded(Duration::from_millis(100), "noop", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let err = bounded(Duration::from_millis(10), "fixtures.lock", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        match err {
            MatchdayError::Timeout {
                operation,
                timeout_ms,
            } => {
                assert_eq!(operation, "fixtures.lock");
                assert_eq!(timeout_ms, 10);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
