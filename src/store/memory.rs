//! In-process store
//!
//! Applies the same predicate-based batch semantics as the Postgres backend
//! under a single write lock, and counts every row it actually changes so
//! callers can verify that a repeated run performs no further writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    FixtureRepository, LeaderboardRepository, PredictionRepository, SpecialPredictionRepository,
};
use crate::domain::{
    Fixture, FixtureId, FixtureStatus, HistoryRecord, LeaderboardEntry, Prediction,
    RebuildSummary, Score, ScoreUpdate, SpecialLock, SpecialPrediction, TeamId, UserId,
};
use crate::error::{MatchdayError, Result};

/// Rows changed per entity since the store was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteCounts {
    pub fixtures: u64,
    pub predictions: u64,
    pub special_predictions: u64,
    pub leaderboard_entries: u64,
    pub history_records: u64,
}

/// Initial contents for a [`MemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub fixtures: Vec<Fixture>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub special_predictions: Vec<SpecialPrediction>,
    #[serde(default)]
    pub leaderboard: Vec<LeaderboardEntry>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

#[derive(Debug, Default)]
struct MemoryState {
    fixtures: BTreeMap<FixtureId, Fixture>,
    predictions: BTreeMap<i64, Prediction>,
    specials: BTreeMap<UserId, SpecialPrediction>,
    entries: BTreeMap<UserId, LeaderboardEntry>,
    history: Vec<HistoryRecord>,
    writes: WriteCounts,
}

/// Store backed by ordered maps behind a tokio `RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from seed data, enforcing the same uniqueness rules as inserts
    pub async fn from_seed(seed: SeedData) -> Result<Self> {
        let store = Self::new();
        for fixture in seed.fixtures {
            store.upsert_fixture(fixture).await?;
        }
        for prediction in seed.predictions {
            store.insert_prediction(prediction).await?;
        }
        for special in seed.special_predictions {
            store.insert_special_prediction(special).await?;
        }
        {
            let mut state = store.state.write().await;
            for entry in seed.leaderboard {
                state.entries.insert(entry.user_id, entry);
            }
            state.history = seed.history;
            state.writes = WriteCounts::default();
        }
        Ok(store)
    }

    /// Load seed data from a JSON file
    pub async fn from_seed_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        Self::from_seed(seed).await
    }

    /// Insert or update a fixture the way the sync source would.
    ///
    /// Status may only move forward and a lock is never released; an update
    /// that would do either is refused.
    pub async fn upsert_fixture(&self, fixture: Fixture) -> Result<()> {
        if fixture.has_partial_score() {
            return Err(MatchdayError::InvalidInput(format!(
                "fixture {} has only one side of its score",
                fixture.id
            )));
        }

        let mut state = self.state.write().await;
        let mut fixture = fixture;
        if let Some(existing) = state.fixtures.get(&fixture.id) {
            if !existing.status.can_transition_to(fixture.status) {
                return Err(MatchdayError::InvalidTransition {
                    from: existing.status.to_string(),
                    to: fixture.status.to_string(),
                });
            }
            fixture.predictions_locked |= existing.predictions_locked;
            if *existing == fixture {
                return Ok(());
            }
        }
        state.fixtures.insert(fixture.id, fixture);
        state.writes.fixtures += 1;
        Ok(())
    }

    /// Correct or set the final score of an existing fixture
    pub async fn set_final_score(&self, fixture_id: FixtureId, score: Score) -> Result<()> {
        let mut state = self.state.write().await;
        let fixture = state
            .fixtures
            .get_mut(&fixture_id)
            .ok_or_else(|| MatchdayError::NotFound(format!("fixture {fixture_id}")))?;
        if fixture.final_score() != Some(score) {
            fixture.home_score = Some(score.home);
            fixture.away_score = Some(score.away);
            state.writes.fixtures += 1;
        }
        Ok(())
    }

    pub async fn insert_prediction(&self, prediction: Prediction) -> Result<()> {
        let mut state = self.state.write().await;
        let duplicate = state.predictions.values().any(|p| {
            p.id == prediction.id
                || (p.user_id == prediction.user_id && p.fixture_id == prediction.fixture_id)
        });
        if duplicate {
            return Err(MatchdayError::InvalidInput(format!(
                "prediction {} duplicates an existing id or (user, fixture) pair",
                prediction.id
            )));
        }
        state.predictions.insert(prediction.id, prediction);
        state.writes.predictions += 1;
        Ok(())
    }

    pub async fn insert_special_prediction(&self, special: SpecialPrediction) -> Result<()> {
        let mut state = self.state.write().await;
        if state.specials.contains_key(&special.user_id) {
            return Err(MatchdayError::InvalidInput(format!(
                "user {} already has special predictions",
                special.user_id
            )));
        }
        state.specials.insert(special.user_id, special);
        state.writes.special_predictions += 1;
        Ok(())
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.state.read().await.writes
    }

    pub async fn fixtures(&self) -> Vec<Fixture> {
        self.state.read().await.fixtures.values().cloned().collect()
    }

    pub async fn predictions(&self) -> Vec<Prediction> {
        self.state.read().await.predictions.values().cloned().collect()
    }

    pub async fn special_predictions(&self) -> Vec<SpecialPrediction> {
        self.state.read().await.specials.values().cloned().collect()
    }

    pub async fn history(&self) -> Vec<HistoryRecord> {
        self.state.read().await.history.clone()
    }
}

/// Fresh totals per user plus the number of predictions pointing at missing fixtures
fn compute_totals(state: &MemoryState) -> (BTreeMap<UserId, LeaderboardEntry>, u64) {
    let mut totals: BTreeMap<UserId, LeaderboardEntry> = state
        .entries
        .keys()
        .map(|user_id| (*user_id, LeaderboardEntry::empty(*user_id)))
        .collect();

    let mut orphans = 0;
    for prediction in state.predictions.values() {
        let Some(fixture) = state.fixtures.get(&prediction.fixture_id) else {
            orphans += 1;
            continue;
        };

        let entry = totals
            .entry(prediction.user_id)
            .or_insert_with(|| LeaderboardEntry::empty(prediction.user_id));

        let on_final = fixture.status == FixtureStatus::Final;
        let Some(points) = prediction.points.filter(|_| on_final) else {
            continue;
        };

        entry.total_points += i64::from(points);
        entry.predictions_scored += 1;
        if prediction.is_exact {
            entry.exact_count += 1;
        }
        if points >= 1 {
            entry.correct_outcomes += 1;
        }
    }

    (totals, orphans)
}

#[async_trait]
impl FixtureRepository for MemoryStore {
    async fn get_fixture(&self, id: FixtureId) -> Result<Option<Fixture>> {
        Ok(self.state.read().await.fixtures.get(&id).cloned())
    }

    async fn lock_kicking_off_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();
        for fixture in state.fixtures.values_mut() {
            if fixture.status == FixtureStatus::Scheduled
                && !fixture.predictions_locked
                && fixture.kickoff_at <= cutoff
            {
                fixture.predictions_locked = true;
                changed.push(fixture.id);
            }
        }
        state.writes.fixtures += changed.len() as u64;
        Ok(changed)
    }

    async fn promote_kicked_off(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();
        for fixture in state.fixtures.values_mut() {
            if fixture.status == FixtureStatus::Scheduled && fixture.kickoff_at <= now {
                fixture.status = FixtureStatus::Live;
                changed.push(fixture.id);
            }
        }
        state.writes.fixtures += changed.len() as u64;
        Ok(changed)
    }

    async fn finalize_scored(&self, kicked_off_before: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let mut state = self.state.write().await;
        let mut changed = Vec::new();
        for fixture in state.fixtures.values_mut() {
            if fixture.status == FixtureStatus::Live
                && fixture.final_score().is_some()
                && fixture.kickoff_at <= kicked_off_before
            {
                fixture.status = FixtureStatus::Final;
                changed.push(fixture.id);
            }
        }
        state.writes.fixtures += changed.len() as u64;
        Ok(changed)
    }

    async fn earliest_kickoff(&self) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        Ok(state.fixtures.values().map(|f| f.kickoff_at).min())
    }

    async fn earliest_kickoff_for_team(&self, team_id: TeamId) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.read().await;
        Ok(state
            .fixtures
            .values()
            .filter(|f| f.involves(team_id))
            .map(|f| f.kickoff_at)
            .min())
    }

    async fn final_fixtures(&self) -> Result<Vec<Fixture>> {
        let state = self.state.read().await;
        let mut fixtures: Vec<Fixture> = state
            .fixtures
            .values()
            .filter(|f| f.status == FixtureStatus::Final)
            .cloned()
            .collect();
        fixtures.sort_by_key(|f| (f.kickoff_at, f.id));
        Ok(fixtures)
    }
}

#[async_trait]
impl PredictionRepository for MemoryStore {
    async fn predictions_for_fixture(&self, fixture_id: FixtureId) -> Result<Vec<Prediction>> {
        let state = self.state.read().await;
        Ok(state
            .predictions
            .values()
            .filter(|p| p.fixture_id == fixture_id)
            .cloned()
            .collect())
    }

    async fn apply_scores(&self, updates: Vec<ScoreUpdate>) -> Result<u64> {
        let mut state = self.state.write().await;
        if let Some(missing) = updates
            .iter()
            .find(|u| !state.predictions.contains_key(&u.prediction_id))
        {
            return Err(MatchdayError::NotFound(format!(
                "prediction {}",
                missing.prediction_id
            )));
        }

        let mut written = 0;
        for update in &updates {
            if let Some(prediction) = state.predictions.get_mut(&update.prediction_id) {
                if prediction.points != Some(update.points)
                    || prediction.is_exact != update.is_exact
                {
                    prediction.points = Some(update.points);
                    prediction.is_exact = update.is_exact;
                    written += 1;
                }
            }
        }
        state.writes.predictions += written;
        debug!("Applied {} of {} score updates", written, updates.len());
        Ok(written)
    }
}

#[async_trait]
impl SpecialPredictionRepository for MemoryStore {
    async fn set_lock(&self, lock: SpecialLock) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for special in state.specials.values_mut() {
            if !lock.is_set(special) {
                match lock {
                    SpecialLock::Main => special.main_locked = true,
                    SpecialLock::HomeNation => special.home_nation_locked = true,
                }
                changed += 1;
            }
        }
        state.writes.special_predictions += changed;
        Ok(changed)
    }
}

#[async_trait]
impl LeaderboardRepository for MemoryStore {
    async fn rebuild_totals(&self) -> Result<RebuildSummary> {
        let mut state = self.state.write().await;
        let (totals, orphan_predictions) = compute_totals(&state);

        let mut changed = 0;
        for (user_id, fresh) in totals {
            if state.entries.get(&user_id) != Some(&fresh) {
                state.entries.insert(user_id, fresh);
                changed += 1;
            }
        }
        state.writes.leaderboard_entries += changed;
        Ok(RebuildSummary {
            entries_changed: changed,
            orphan_predictions,
        })
    }

    async fn snapshot_entries(&self) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.state.read().await.entries.values().cloned().collect())
    }

    async fn latest_positions(&self) -> Result<HashMap<UserId, u32>> {
        let state = self.state.read().await;
        let mut latest: HashMap<UserId, (DateTime<Utc>, u32)> = HashMap::new();
        for record in &state.history {
            let slot = latest
                .entry(record.user_id)
                .or_insert((record.recorded_at, record.position));
            if record.recorded_at >= slot.0 {
                *slot = (record.recorded_at, record.position);
            }
        }
        Ok(latest
            .into_iter()
            .map(|(user_id, (_, position))| (user_id, position))
            .collect())
    }

    async fn append_history(&self, records: Vec<HistoryRecord>) -> Result<u64> {
        let mut state = self.state.write().await;
        let appended = records.len() as u64;
        state.history.extend(records);
        state.writes.history_records += appended;
        Ok(appended)
    }

    async fn history_for_user(&self, user_id: UserId) -> Result<Vec<HistoryRecord>> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
