//! Scoring Engine
//!
//! Turns final scores into per-prediction point awards. A stored award is
//! only overwritten when the freshly computed value differs, so rescoring
//! unchanged data performs no writes and every persisted change is a real
//! correction.

pub mod points;

pub use points::{score_prediction, CORRECT_OUTCOME_POINTS, EXACT_SCORE_POINTS};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{Fixture, FixtureId, Score, ScoreUpdate};
use crate::error::{MatchdayError, Result};
use crate::store::{bounded, FixtureRepository, PredictionRepository};

/// Counters for one scoring pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringReport {
    /// Fixtures whose predictions were scored
    pub fixtures_processed: u64,
    /// Final fixtures without a complete score
    pub fixtures_skipped: u64,
    /// Fixtures whose predictions could not be read or written
    pub fixtures_failed: u64,
    pub predictions_updated: u64,
    /// Predictions that became exact in this pass
    pub newly_exact: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ScoringReport {
    pub fn is_clean(&self) -> bool {
        self.fixtures_failed == 0
    }
}

#[derive(Debug, Default)]
struct FixtureOutcome {
    updated: u64,
    newly_exact: u64,
}

pub struct ScoringEngine {
    fixtures: Arc<dyn FixtureRepository>,
    predictions: Arc<dyn PredictionRepository>,
    store_timeout: Duration,
}

impl ScoringEngine {
    pub fn new(
        fixtures: Arc<dyn FixtureRepository>,
        predictions: Arc<dyn PredictionRepository>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            fixtures,
            predictions,
            store_timeout,
        }
    }

    /// Score one fixture, or every final fixture when `fixture_id` is `None`.
    ///
    /// A named fixture must exist, be final and carry both score components;
    /// otherwise the call is rejected before anything is written. In the
    /// full pass such fixtures are counted as skipped instead.
    pub async fn recalculate_points(&self, fixture_id: Option<FixtureId>) -> Result<ScoringReport> {
        match fixture_id {
            Some(id) => self.recalculate_fixture(id).await,
            None => self.recalculate_all().await,
        }
    }

    async fn recalculate_fixture(&self, fixture_id: FixtureId) -> Result<ScoringReport> {
        let fixture = bounded(
            self.store_timeout,
            "fixtures.get",
            self.fixtures.get_fixture(fixture_id),
        )
        .await?
        .ok_or_else(|| MatchdayError::NotFound(format!("fixture {fixture_id}")))?;

        if !fixture.is_scorable() {
            return Err(MatchdayError::InvalidInput(format!(
                "fixture {} is {} without a complete final score",
                fixture.id, fixture.status
            )));
        }

        let mut report = ScoringReport::default();
        self.score_into(&fixture, &mut report).await;
        Ok(report)
    }

    async fn recalculate_all(&self) -> Result<ScoringReport> {
        let fixtures = bounded(
            self.store_timeout,
            "fixtures.final",
            self.fixtures.final_fixtures(),
        )
        .await?;

        let mut report = ScoringReport::default();
        for fixture in &fixtures {
            if fixture.final_score().is_none() {
                warn!(fixture_id = fixture.id, "Final fixture has no complete score, skipping");
                report.fixtures_skipped += 1;
                continue;
            }
            self.score_into(fixture, &mut report).await;
        }

        info!(
            processed = report.fixtures_processed,
            skipped = report.fixtures_skipped,
            failed = report.fixtures_failed,
            updated = report.predictions_updated,
            newly_exact = report.newly_exact,
            "Points recalculated"
        );
        Ok(report)
    }

    async fn score_into(&self, fixture: &Fixture, report: &mut ScoringReport) {
        let Some(actual) = fixture.final_score() else {
            report.fixtures_skipped += 1;
            return;
        };

        match self.score_fixture(fixture.id, actual).await {
            Ok(outcome) => {
                report.fixtures_processed += 1;
                report.predictions_updated += outcome.updated;
                report.newly_exact += outcome.newly_exact;
            }
            Err(e) => {
                warn!(fixture_id = fixture.id, error = %e, "Failed to score fixture");
                report.fixtures_failed += 1;
                report.errors.push(format!("fixture {}: {}", fixture.id, e));
            }
        }
    }

    async fn score_fixture(&self, fixture_id: FixtureId, actual: Score) -> Result<FixtureOutcome> {
        let predictions = bounded(
            self.store_timeout,
            "predictions.for_fixture",
            self.predictions.predictions_for_fixture(fixture_id),
        )
        .await?;

        let mut updates = Vec::new();
        let mut newly_exact = 0;
        for prediction in &predictions {
            let award = score_prediction(prediction.forecast(), actual);
            if !prediction.differs_from(award) {
                continue;
            }
            if award.exact && !prediction.is_exact {
                newly_exact += 1;
            }
            updates.push(ScoreUpdate {
                prediction_id: prediction.id,
                points: award.points,
                is_exact: award.exact,
            });
        }

        if updates.is_empty() {
            debug!(fixture_id, predictions = predictions.len(), "Scores already current");
            return Ok(FixtureOutcome::default());
        }

        let updated = bounded(
            self.store_timeout,
            "predictions.apply_scores",
            self.predictions.apply_scores(updates),
        )
        .await?;

        debug!(fixture_id, updated, newly_exact, "Scored fixture");
        Ok(FixtureOutcome {
            updated,
            newly_exact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixtureStatus, Prediction};
    use crate::store::{MockFixtureRepository, MockPredictionRepository};
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn final_fixture(id: FixtureId, score: Option<(u32, u32)>) -> Fixture {
        Fixture {
            id,
            home_team_id: 1,
            away_team_id: 2,
            kickoff_at: Utc.with_ymd_and_hms(2026, 6, 12, 18, 0, 0).unwrap(),
            venue: String::new(),
            home_score: score.map(|s| s.0),
            away_score: score.map(|s| s.1),
            status: FixtureStatus::Final,
            predictions_locked: true,
        }
    }

    fn prediction(id: i64, fixture_id: FixtureId, forecast: (u32, u32)) -> Prediction {
        Prediction {
            id,
            user_id: Uuid::new_v4(),
            fixture_id,
            home_goals: forecast.0,
            away_goals: forecast.1,
            points: None,
            is_exact: false,
        }
    }

    fn engine(
        fixtures: MockFixtureRepository,
        predictions: MockPredictionRepository,
    ) -> ScoringEngine {
        ScoringEngine::new(
            Arc::new(fixtures),
            Arc::new(predictions),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_prediction_read_failure_skips_only_that_fixture() {
        let mut fixtures = MockFixtureRepository::new();
        fixtures.expect_final_fixtures().returning(|| {
            Ok(vec![
                final_fixture(1, Some((2, 1))),
                final_fixture(2, Some((0, 0))),
                final_fixture(3, None),
            ])
        });

        let mut predictions = MockPredictionRepository::new();
        predictions
            .expect_predictions_for_fixture()
            .with(eq(1))
            .returning(|_| Err(MatchdayError::Internal("connection reset".into())));
        predictions
            .expect_predictions_for_fixture()
            .with(eq(2))
            .returning(|_| Ok(vec![prediction(10, 2, (0, 0)), prediction(11, 2, (1, 0))]));
        predictions
            .expect_apply_scores()
            .times(1)
            .returning(|updates| Ok(updates.len() as u64));

        let report = engine(fixtures, predictions)
            .recalculate_points(None)
            .await
            .unwrap();

        assert_eq!(report.fixtures_processed, 1);
        assert_eq!(report.fixtures_failed, 1);
        assert_eq!(report.fixtures_skipped, 1);
        assert_eq!(report.predictions_updated, 2);
        assert_eq!(report.newly_exact, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("fixture 1"));
    }

    #[tokio::test]
    async fn test_unchanged_awards_are_not_written() {
        let mut fixtures = MockFixtureRepository::new();
        fixtures
            .expect_final_fixtures()
            .returning(|| Ok(vec![final_fixture(1, Some((2, 1)))]));

        let mut predictions = MockPredictionRepository::new();
        predictions.expect_predictions_for_fixture().returning(|_| {
            let mut scored = prediction(10, 1, (2, 1));
            scored.points = Some(3);
            scored.is_exact = true;
            Ok(vec![scored])
        });
        predictions.expect_apply_scores().never();

        let report = engine(fixtures, predictions)
            .recalculate_points(None)
            .await
            .unwrap();
        assert_eq!(report.fixtures_processed, 1);
        assert_eq!(report.predictions_updated, 0);
        assert_eq!(report.newly_exact, 0);
    }

    #[tokio::test]
    async fn test_single_fixture_must_be_scorable() {
        let mut fixtures = MockFixtureRepository::new();
        fixtures
            .expect_get_fixture()
            .with(eq(5))
            .returning(|id| Ok(Some(final_fixture(id, None))));
        fixtures.expect_get_fixture().with(eq(6)).returning(|_| Ok(None));

        let mut predictions = MockPredictionRepository::new();
        predictions.expect_predictions_for_fixture().never();

        let engine = engine(fixtures, predictions);
        let err = engine.recalculate_points(Some(5)).await.unwrap_err();
        assert!(matches!(err, MatchdayError::InvalidInput(_)));

        let err = engine.recalculate_points(Some(6)).await.unwrap_err();
        assert!(matches!(err, MatchdayError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_failure_counts_fixture_as_failed() {
        let mut fixtures = MockFixtureRepository::new();
        fixtures
            .expect_get_fixture()
            .returning(|id| Ok(Some(final_fixture(id, Some((1, 1))))));

        let mut predictions = MockPredictionRepository::new();
        predictions
            .expect_predictions_for_fixture()
            .returning(|id| Ok(vec![prediction(1, id, (1, 1))]));
        predictions
            .expect_apply_scores()
            .returning(|_| Err(MatchdayError::Internal("deadlock detected".into())));

        let report = engine(fixtures, predictions)
            .recalculate_points(Some(9))
            .await
            .unwrap();
        assert_eq!(report.fixtures_processed, 0);
        assert_eq!(report.fixtures_failed, 1);
        assert_eq!(report.newly_exact, 0);
        assert!(!report.is_clean());
    }
}
