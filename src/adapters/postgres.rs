use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
    Fixture, FixtureId, FixtureStatus, HistoryRecord, LeaderboardEntry, Prediction,
    RebuildSummary, ScoreUpdate, SpecialLock, TeamId, UserId,
};
use crate::error::{MatchdayError, Result};
use crate::store::{
    FixtureRepository, LeaderboardRepository, PredictionRepository, SpecialPredictionRepository,
};

const FIXTURE_COLUMNS: &str = "id, home_team_id, away_team_id, kickoff_at, venue, \
     home_score, away_score, status, predictions_locked";

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn non_negative(value: Option<i32>, column: &str) -> Result<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                MatchdayError::InvariantViolation(format!("{column} is negative: {v}"))
            })
        })
        .transpose()
}

fn fixture_from_row(row: &PgRow) -> Result<Fixture> {
    let status: String = row.get("status");
    let status =
        FixtureStatus::try_from(status.as_str()).map_err(MatchdayError::InvariantViolation)?;

    Ok(Fixture {
        id: row.get("id"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        kickoff_at: row.get("kickoff_at"),
        venue: row.get("venue"),
        home_score: non_negative(row.get("home_score"), "home_score")?,
        away_score: non_negative(row.get("away_score"), "away_score")?,
        status,
        predictions_locked: row.get("predictions_locked"),
    })
}

fn prediction_from_row(row: &PgRow) -> Result<Prediction> {
    Ok(Prediction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        fixture_id: row.get("fixture_id"),
        home_goals: non_negative(Some(row.get("home_goals")), "home_goals")?.unwrap_or_default(),
        away_goals: non_negative(Some(row.get("away_goals")), "away_goals")?.unwrap_or_default(),
        points: row.get("points"),
        is_exact: row.get("is_exact"),
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryRecord> {
    let position: i32 = row.get("position");
    Ok(HistoryRecord {
        user_id: row.get("user_id"),
        position: non_negative(Some(position), "position")?.unwrap_or_default(),
        total_points: row.get("total_points"),
        exact_count: row.get("exact_count"),
        recorded_at: row.get("recorded_at"),
    })
}

// ==================== Fixtures ====================

#[async_trait]
impl FixtureRepository for PostgresStore {
    async fn get_fixture(&self, id: FixtureId) -> Result<Option<Fixture>> {
        let row = sqlx::query(&format!("SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(fixture_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn lock_kicking_off_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let rows = sqlx::query(
            r#"
            UPDATE fixtures
            SET predictions_locked = TRUE, updated_at = NOW()
            WHERE status = 'scheduled'
              AND NOT predictions_locked
              AND kickoff_at <= $1
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    #[instrument(skip(self))]
    async fn promote_kicked_off(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let rows = sqlx::query(
            r#"
            UPDATE fixtures
            SET status = 'live', updated_at = NOW()
            WHERE status = 'scheduled'
              AND kickoff_at <= $1
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    #[instrument(skip(self))]
    async fn finalize_scored(&self, kicked_off_before: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let rows = sqlx::query(
            r#"
            UPDATE fixtures
            SET status = 'final', updated_at = NOW()
            WHERE status = 'live'
              AND home_score IS NOT NULL
              AND away_score IS NOT NULL
              AND kickoff_at <= $1
            RETURNING id
            "#,
        )
        .bind(kicked_off_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn earliest_kickoff(&self) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT MIN(kickoff_at) AS first_kickoff FROM fixtures")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("first_kickoff"))
    }

    async fn earliest_kickoff_for_team(&self, team_id: TeamId) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT MIN(kickoff_at) AS first_kickoff
            FROM fixtures
            WHERE home_team_id = $1 OR away_team_id = $1
            "#,
        )
        .bind(team_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("first_kickoff"))
    }

    async fn final_fixtures(&self) -> Result<Vec<Fixture>> {
        let rows = sqlx::query(&format!(
            "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE status = 'final' ORDER BY kickoff_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fixture_from_row).collect()
    }
}

// ==================== Predictions ====================

#[async_trait]
impl PredictionRepository for PostgresStore {
    async fn predictions_for_fixture(&self, fixture_id: FixtureId) -> Result<Vec<Prediction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, fixture_id, home_goals, away_goals, points, is_exact
            FROM predictions
            WHERE fixture_id = $1
            ORDER BY id
            "#,
        )
        .bind(fixture_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(prediction_from_row).collect()
    }

    /// One statement for the whole batch; rows whose stored award already
    /// matches are filtered out by `IS DISTINCT FROM` and not rewritten.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn apply_scores(&self, updates: Vec<ScoreUpdate>) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = updates.iter().map(|u| u.prediction_id).collect();
        let points: Vec<i32> = updates.iter().map(|u| u.points).collect();
        let exact: Vec<bool> = updates.iter().map(|u| u.is_exact).collect();

        let result = sqlx::query(
            r#"
            UPDATE predictions AS p
            SET points = u.points, is_exact = u.is_exact, updated_at = NOW()
            FROM UNNEST($1::BIGINT[], $2::INTEGER[], $3::BOOLEAN[]) AS u(id, points, is_exact)
            WHERE p.id = u.id
              AND (p.points IS DISTINCT FROM u.points OR p.is_exact IS DISTINCT FROM u.is_exact)
            "#,
        )
        .bind(&ids)
        .bind(&points)
        .bind(&exact)
        .execute(&self.pool)
        .await?;

        debug!("Applied {} of {} score updates", result.rows_affected(), updates.len());
        Ok(result.rows_affected())
    }
}

// ==================== Special predictions ====================

#[async_trait]
impl SpecialPredictionRepository for PostgresStore {
    #[instrument(skip(self))]
    async fn set_lock(&self, lock: SpecialLock) -> Result<u64> {
        let query = match lock {
            SpecialLock::Main => {
                "UPDATE special_predictions SET main_locked = TRUE, updated_at = NOW() \
                 WHERE NOT main_locked"
            }
            SpecialLock::HomeNation => {
                "UPDATE special_predictions SET home_nation_locked = TRUE, updated_at = NOW() \
                 WHERE NOT home_nation_locked"
            }
        };

        let result = sqlx::query(query).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

// ==================== Leaderboard ====================

#[async_trait]
impl LeaderboardRepository for PostgresStore {
    /// Recompute every entry from predictions on final fixtures in one
    /// upsert. Users with an entry but no predictions are reset to zero.
    #[instrument(skip(self))]
    async fn rebuild_totals(&self) -> Result<RebuildSummary> {
        let result = sqlx::query(
            r#"
            WITH scored AS (
                SELECT p.user_id,
                       COALESCE(SUM(p.points) FILTER (WHERE f.status = 'final'), 0)::BIGINT AS total_points,
                       COUNT(*) FILTER (WHERE f.status = 'final' AND p.points IS NOT NULL AND p.is_exact) AS exact_count,
                       COUNT(*) FILTER (WHERE f.status = 'final' AND p.points >= 1) AS correct_outcomes,
                       COUNT(*) FILTER (WHERE f.status = 'final' AND p.points IS NOT NULL) AS predictions_scored
                FROM predictions p
                JOIN fixtures f ON f.id = p.fixture_id
                GROUP BY p.user_id
            ),
            totals AS (
                SELECT * FROM scored
                UNION ALL
                SELECT l.user_id, 0, 0, 0, 0
                FROM leaderboard l
                WHERE NOT EXISTS (SELECT 1 FROM scored s WHERE s.user_id = l.user_id)
            )
            INSERT INTO leaderboard (user_id, total_points, exact_count, correct_outcomes, predictions_scored)
            SELECT user_id, total_points, exact_count, correct_outcomes, predictions_scored
            FROM totals
            ON CONFLICT (user_id) DO UPDATE SET
                total_points = EXCLUDED.total_points,
                exact_count = EXCLUDED.exact_count,
                correct_outcomes = EXCLUDED.correct_outcomes,
                predictions_scored = EXCLUDED.predictions_scored,
                updated_at = NOW()
            WHERE (leaderboard.total_points, leaderboard.exact_count,
                   leaderboard.correct_outcomes, leaderboard.predictions_scored)
                  IS DISTINCT FROM
                  (EXCLUDED.total_points, EXCLUDED.exact_count,
                   EXCLUDED.correct_outcomes, EXCLUDED.predictions_scored)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // The JOIN above already drops these; count them for the report
        let orphans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM predictions p \
             WHERE NOT EXISTS (SELECT 1 FROM fixtures f WHERE f.id = p.fixture_id)",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RebuildSummary {
            entries_changed: result.rows_affected(),
            orphan_predictions: orphans.max(0) as u64,
        })
    }

    /// Read all entries inside a repeatable-read transaction so the ranking
    /// sees one consistent state even while scores are being written.
    async fn snapshot_entries(&self) -> Result<Vec<LeaderboardEntry>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT user_id, total_points, exact_count, correct_outcomes, predictions_scored
            FROM leaderboard
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows
            .iter()
            .map(|r| LeaderboardEntry {
                user_id: r.get("user_id"),
                total_points: r.get("total_points"),
                exact_count: r.get("exact_count"),
                correct_outcomes: r.get("correct_outcomes"),
                predictions_scored: r.get("predictions_scored"),
            })
            .collect())
    }

    async fn latest_positions(&self) -> Result<HashMap<UserId, u32>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (user_id) user_id, position
            FROM leaderboard_history
            ORDER BY user_id, recorded_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                let user_id: Uuid = r.get("user_id");
                let position =
                    non_negative(Some(r.get("position")), "position")?.unwrap_or_default();
                Ok((user_id, position))
            })
            .collect()
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn append_history(&self, records: Vec<HistoryRecord>) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let user_ids: Vec<Uuid> = records.iter().map(|r| r.user_id).collect();
        let positions: Vec<i32> = records
            .iter()
            .map(|r| i32::try_from(r.position))
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| MatchdayError::InvalidInput("position out of range".to_string()))?;
        let points: Vec<i64> = records.iter().map(|r| r.total_points).collect();
        let exact: Vec<i64> = records.iter().map(|r| r.exact_count).collect();
        let recorded_at: Vec<DateTime<Utc>> = records.iter().map(|r| r.recorded_at).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO leaderboard_history (user_id, position, total_points, exact_count, recorded_at)
            SELECT * FROM UNNEST($1::UUID[], $2::INTEGER[], $3::BIGINT[], $4::BIGINT[], $5::TIMESTAMPTZ[])
            "#,
        )
        .bind(&user_ids)
        .bind(&positions)
        .bind(&points)
        .bind(&exact)
        .bind(&recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn history_for_user(&self, user_id: UserId) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, position, total_points, exact_count, recorded_at
            FROM leaderboard_history
            WHERE user_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(history_from_row).collect()
    }
}
