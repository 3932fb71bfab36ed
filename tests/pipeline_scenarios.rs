use chrono::{DateTime, Duration, TimeZone, Utc};
use matchday::config::AppConfig;
use matchday::pipeline::{NoopSync, Orchestrator, Stage, StageDetail};
use matchday::{
    Fixture, FixtureId, FixtureStatus, LockOutcome, MemoryStore, Prediction, Score,
    SpecialPrediction, UserId,
};
use std::sync::Arc;
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 11, 18, 0, 0).unwrap()
}

fn fixture(id: FixtureId, kickoff_at: DateTime<Utc>, status: FixtureStatus) -> Fixture {
    Fixture {
        id,
        home_team_id: id * 10,
        away_team_id: id * 10 + 1,
        kickoff_at,
        venue: format!("Stadium {id}"),
        home_score: None,
        away_score: None,
        status,
        predictions_locked: status != FixtureStatus::Scheduled,
    }
}

fn final_fixture(id: FixtureId, kickoff_at: DateTime<Utc>, score: Score) -> Fixture {
    Fixture {
        home_score: Some(score.home),
        away_score: Some(score.away),
        ..fixture(id, kickoff_at, FixtureStatus::Final)
    }
}

fn prediction(id: i64, user_id: UserId, fixture_id: FixtureId, home: u32, away: u32) -> Prediction {
    Prediction {
        id,
        user_id,
        fixture_id,
        home_goals: home,
        away_goals: away,
        points: None,
        is_exact: false,
    }
}

fn special(user_id: UserId) -> SpecialPrediction {
    SpecialPrediction {
        user_id,
        champion_team_id: Some(10),
        runner_up_team_id: Some(20),
        top_scorer: None,
        home_nation_stage: None,
        main_locked: false,
        home_nation_locked: false,
    }
}

fn orchestrator(store: &Arc<MemoryStore>, config: &AppConfig) -> Orchestrator {
    Orchestrator::from_store(store.clone(), Arc::new(NoopSync), config)
}

/// A fixture 30 minutes out is locked; one 2 hours out is not. Re-running
/// writes nothing.
#[tokio::test]
async fn close_deadlines_respects_lead_window_and_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_fixture(fixture(1, now() + Duration::minutes(30), FixtureStatus::Scheduled))
        .await
        .unwrap();
    store
        .upsert_fixture(fixture(2, now() + Duration::hours(2), FixtureStatus::Scheduled))
        .await
        .unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    let locked = orchestrator
        .lifecycle()
        .close_upcoming_predictions(now())
        .await
        .unwrap();
    assert_eq!(locked, vec![1]);

    let before = store.write_counts().await;
    let again = orchestrator
        .lifecycle()
        .close_upcoming_predictions(now())
        .await
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(store.write_counts().await, before);

    let fixtures = store.fixtures().await;
    assert!(fixtures[0].predictions_locked);
    assert!(!fixtures[1].predictions_locked);
    assert!(fixtures
        .iter()
        .all(|f| f.status == FixtureStatus::Scheduled));
}

/// Final 2-1: exact pick earns 3, right winner 1, draw 0. A second pass
/// writes nothing.
#[tokio::test]
async fn recalculate_points_awards_and_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let kickoff = now() - Duration::hours(3);
    store
        .upsert_fixture(final_fixture(7, kickoff, Score { home: 2, away: 1 }))
        .await
        .unwrap();

    let (exact, winner, draw) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    store.insert_prediction(prediction(1, exact, 7, 2, 1)).await.unwrap();
    store.insert_prediction(prediction(2, winner, 7, 3, 0)).await.unwrap();
    store.insert_prediction(prediction(3, draw, 7, 1, 1)).await.unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    let report = orchestrator.scoring().recalculate_points(None).await.unwrap();
    assert_eq!(report.fixtures_processed, 1);
    assert_eq!(report.predictions_updated, 3);
    assert_eq!(report.newly_exact, 1);

    let awards: Vec<(Option<i32>, bool)> = store
        .predictions()
        .await
        .iter()
        .map(|p| (p.points, p.is_exact))
        .collect();
    assert_eq!(awards, vec![(Some(3), true), (Some(1), false), (Some(0), false)]);

    let before = store.write_counts().await;
    let again = orchestrator.scoring().recalculate_points(Some(7)).await.unwrap();
    assert_eq!(again.predictions_updated, 0);
    assert_eq!(store.write_counts().await, before);
}

/// Correcting a final score rewrites only the awards that change.
#[tokio::test]
async fn score_correction_rewrites_changed_awards() {
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_fixture(final_fixture(
            3,
            now() - Duration::hours(4),
            Score { home: 2, away: 1 },
        ))
        .await
        .unwrap();
    store
        .insert_prediction(prediction(1, Uuid::new_v4(), 3, 2, 1))
        .await
        .unwrap();
    store
        .insert_prediction(prediction(2, Uuid::new_v4(), 3, 0, 2))
        .await
        .unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    orchestrator.scoring().recalculate_points(None).await.unwrap();

    store
        .set_final_score(3, Score { home: 1, away: 1 })
        .await
        .unwrap();
    let report = orchestrator.scoring().recalculate_points(None).await.unwrap();
    // 2-1 pick drops from 3 to 0; 0-2 pick stays at 0
    assert_eq!(report.predictions_updated, 1);
    assert_eq!(store.predictions().await[0].points, Some(0));
    assert!(!store.predictions().await[0].is_exact);
}

/// Equal points are ordered by exact-score count.
#[tokio::test]
async fn leaderboard_breaks_point_ties_by_exact_count() {
    let store = Arc::new(MemoryStore::new());
    let kickoff = now() - Duration::days(1);
    for id in 1..=4 {
        store
            .upsert_fixture(final_fixture(
                id,
                kickoff + Duration::hours(id),
                Score { home: 1, away: 0 },
            ))
            .await
            .unwrap();
    }

    let sharp = Uuid::new_v4();
    let steady = Uuid::new_v4();
    // sharp: two exact picks = 6 points, 2 exact
    store.insert_prediction(prediction(1, sharp, 1, 1, 0)).await.unwrap();
    store.insert_prediction(prediction(2, sharp, 2, 1, 0)).await.unwrap();
    // steady: one exact and three outcomes = 6 points, 1 exact
    store.insert_prediction(prediction(3, steady, 1, 1, 0)).await.unwrap();
    store.insert_prediction(prediction(4, steady, 2, 2, 0)).await.unwrap();
    store.insert_prediction(prediction(5, steady, 3, 2, 0)).await.unwrap();
    store.insert_prediction(prediction(6, steady, 4, 3, 1)).await.unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    orchestrator.scoring().recalculate_points(None).await.unwrap();
    let report = orchestrator
        .leaderboard()
        .recompute_leaderboard(now())
        .await
        .unwrap();

    assert_eq!(report.leader, Some(sharp));
    let standings = &report.standings;
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0].entry.total_points, 6);
    assert_eq!(standings[0].entry.exact_count, 2);
    assert_eq!(standings[1].entry.user_id, steady);
    assert_eq!(standings[1].entry.total_points, 6);
    assert_eq!(standings[1].entry.correct_outcomes, 4);
    assert_eq!(standings[1].position, 2);
}

/// Each full run appends exactly one record per user and never rewrites
/// earlier ones.
#[tokio::test]
async fn history_is_append_only_across_runs() {
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_fixture(final_fixture(
            1,
            now() - Duration::hours(5),
            Score { home: 0, away: 0 },
        ))
        .await
        .unwrap();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.insert_prediction(prediction(1, a, 1, 0, 0)).await.unwrap();
    store.insert_prediction(prediction(2, b, 1, 2, 1)).await.unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    let mut snapshots = Vec::new();
    for run in 0..3 {
        let report = orchestrator.run(now() + Duration::minutes(10 * run)).await;
        assert!(report.success, "run {run} failed: {:?}", report.failed_stages());
        snapshots.push(store.history().await);
    }

    let history = store.history().await;
    assert_eq!(history.len(), 6);
    for user in [a, b] {
        assert_eq!(history.iter().filter(|r| r.user_id == user).count(), 3);
    }
    // Earlier records are a prefix of later ones
    assert_eq!(&snapshots[2][..snapshots[0].len()], &snapshots[0][..]);
    assert_eq!(&snapshots[2][..snapshots[1].len()], &snapshots[1][..]);

    let trail = orchestrator.leaderboard().history_for(a).await.unwrap();
    assert_eq!(trail.len(), 3);
    assert!(trail.iter().all(|r| r.position == 1 && r.total_points == 3));

    let standings = orchestrator.leaderboard().standings().await.unwrap();
    assert_eq!(standings[0].entry.user_id, a);
    assert_eq!(standings[0].previous_position, Some(1));
}

/// A prediction whose fixture is gone is counted and left out of the
/// standings; the run still succeeds.
#[tokio::test]
async fn prediction_on_missing_fixture_is_counted_not_ranked() {
    let store = Arc::new(MemoryStore::new());
    let mut stale = prediction(1, Uuid::new_v4(), 999, 1, 0);
    stale.points = Some(3);
    stale.is_exact = true;
    store.insert_prediction(stale).await.unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    let report = orchestrator.run(now()).await;
    assert!(report.success, "failed stages: {:?}", report.failed_stages());

    let stage = report.stage(Stage::RecomputeLeaderboard).unwrap();
    match stage.detail.as_ref().unwrap() {
        StageDetail::Leaderboard(detail) => {
            assert_eq!(detail.orphan_predictions, 1);
            assert_eq!(detail.entries_ranked, 0);
            assert_eq!(detail.history_written, 0);
        }
        other => panic!("unexpected detail: {other:?}"),
    }
    assert!(orchestrator.leaderboard().standings().await.unwrap().is_empty());
    assert!(store.history().await.is_empty());
}

/// A full run moves a kicked-off scored fixture through live to final and
/// scores it in the same invocation. Later runs never move anything back.
#[tokio::test]
async fn full_run_advances_fixtures_monotonically() {
    let store = Arc::new(MemoryStore::new());
    let mut played = fixture(1, now() - Duration::hours(3), FixtureStatus::Scheduled);
    played.home_score = Some(2);
    played.away_score = Some(0);
    store.upsert_fixture(played).await.unwrap();
    store
        .upsert_fixture(fixture(2, now() + Duration::minutes(45), FixtureStatus::Scheduled))
        .await
        .unwrap();
    store
        .upsert_fixture(fixture(3, now() - Duration::minutes(20), FixtureStatus::Scheduled))
        .await
        .unwrap();

    let user = Uuid::new_v4();
    store.insert_prediction(prediction(1, user, 1, 1, 0)).await.unwrap();
    store.insert_special_prediction(special(user)).await.unwrap();

    let orchestrator = orchestrator(&store, &AppConfig::local());
    let report = orchestrator.run(now()).await;
    assert!(report.success);

    let lifecycle = report.stage(Stage::CloseDeadlinesAndPromote).unwrap();
    match lifecycle.detail.as_ref().unwrap() {
        StageDetail::Lifecycle(detail) => {
            assert_eq!(detail.fixtures_locked, 3);
            assert_eq!(detail.fixtures_promoted, 2);
            assert_eq!(detail.fixtures_finalized, 1);
            assert_eq!(detail.main_lock, Some(LockOutcome::Locked { changed: 1 }));
            assert_eq!(detail.home_nation_lock, Some(LockOutcome::Disabled));
        }
        other => panic!("unexpected detail: {other:?}"),
    }

    let statuses: Vec<FixtureStatus> = store.fixtures().await.iter().map(|f| f.status).collect();
    assert_eq!(
        statuses,
        vec![FixtureStatus::Final, FixtureStatus::Scheduled, FixtureStatus::Live]
    );
    assert_eq!(store.predictions().await[0].points, Some(1));

    // Replaying an earlier clock must not regress anything
    let earlier = orchestrator.run(now() - Duration::hours(6)).await;
    assert!(earlier.success);
    let after: Vec<Fixture> = store.fixtures().await;
    assert_eq!(
        after.iter().map(|f| f.status).collect::<Vec<_>>(),
        statuses
    );
    assert!(after.iter().all(|f| f.predictions_locked));
    assert!(store.special_predictions().await[0].main_locked);
}

/// The home-nation lock waits for that team's own first fixture.
#[tokio::test]
async fn home_nation_lock_follows_its_first_fixture() {
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_fixture(fixture(1, now() - Duration::hours(1), FixtureStatus::Scheduled))
        .await
        .unwrap();
    let mut home_match = fixture(2, now() + Duration::days(2), FixtureStatus::Scheduled);
    home_match.home_team_id = 99;
    store.upsert_fixture(home_match).await.unwrap();

    let user = Uuid::new_v4();
    store.insert_special_prediction(special(user)).await.unwrap();

    let mut config = AppConfig::local();
    config.pipeline.home_nation_id = Some(99);
    let orchestrator = orchestrator(&store, &config);

    let report = orchestrator.lifecycle().run(now()).await;
    assert!(report.is_clean());
    assert_eq!(report.main_lock, Some(LockOutcome::Locked { changed: 1 }));
    assert!(matches!(
        report.home_nation_lock,
        Some(LockOutcome::NotStarted { .. })
    ));
    assert!(!store.special_predictions().await[0].home_nation_locked);

    let later = orchestrator.lifecycle().run(now() + Duration::days(3)).await;
    assert_eq!(later.main_lock, Some(LockOutcome::Locked { changed: 0 }));
    assert_eq!(later.home_nation_lock, Some(LockOutcome::Locked { changed: 1 }));
    assert!(store.special_predictions().await[0].home_nation_locked);
}

/// The bundled demo seed runs end to end.
#[tokio::test]
async fn demo_seed_runs_end_to_end() {
    let store = Arc::new(MemoryStore::from_seed_file("demos/seed.json").await.unwrap());
    let orchestrator = orchestrator(&store, &AppConfig::local());

    let at = Utc.with_ymd_and_hms(2026, 6, 12, 0, 0, 0).unwrap();
    let report = orchestrator.run(at).await;
    assert!(report.success, "failed stages: {:?}", report.failed_stages());

    let points: Vec<Option<i32>> = store.predictions().await.iter().map(|p| p.points).collect();
    assert_eq!(points, vec![Some(3), Some(1), Some(0), None]);

    let standings = orchestrator.leaderboard().standings().await.unwrap();
    assert_eq!(standings.len(), 3);
    assert_eq!(standings[0].entry.total_points, 3);
    assert!(store
        .special_predictions()
        .await
        .iter()
        .all(|s| s.main_locked));
}
