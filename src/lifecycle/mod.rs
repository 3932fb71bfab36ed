//! Fixture Lifecycle
//!
//! Advances fixtures and special-forecast latches against an injected `now`:
//! - close predictions for fixtures kicking off within the lead window
//! - promote kicked-off fixtures to live
//! - mark scored live fixtures final once the match window has passed
//! - latch the tournament-wide and home-nation special forecast locks
//!
//! Every transition is a predicate-filtered batch, so re-running with the
//! same or a later `now` changes nothing that already moved. Nothing here
//! can clear a lock or move a status backwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::domain::{FixtureId, SpecialLock, TeamId};
use crate::error::Result;
use crate::store::{bounded, FixtureRepository, SpecialPredictionRepository};

/// Configuration for the lifecycle manager
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long before kickoff predictions close
    pub lead_window: Duration,
    /// How long after kickoff a scored fixture may be marked final
    pub final_after: Duration,
    /// Team whose first fixture closes the home-nation forecasts
    pub home_nation_id: Option<TeamId>,
    pub store_timeout: std::time::Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            lead_window: Duration::hours(1),
            final_after: Duration::hours(2),
            home_nation_id: None,
            store_timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl From<&PipelineConfig> for LifecycleConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            lead_window: config.lead_window(),
            final_after: config.final_after(),
            home_nation_id: config.home_nation_id,
            store_timeout: config.store_timeout(),
        }
    }
}

/// Result of evaluating one special-forecast latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockOutcome {
    /// No home nation configured
    Disabled,
    /// No fixture to measure against
    NoFixtures,
    /// The deciding fixture has not kicked off yet
    NotStarted { first_kickoff: DateTime<Utc> },
    /// Latch is set; `changed` rows were newly locked (0 on repeat runs)
    Locked { changed: u64 },
}

/// A lifecycle sub-operation that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationError {
    pub operation: String,
    pub message: String,
}

/// Counters for one lifecycle pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub fixtures_locked: u64,
    pub fixtures_promoted: u64,
    pub fixtures_finalized: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_lock: Option<LockOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_nation_lock: Option<LockOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OperationError>,
}

impl LifecycleReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_error(&mut self, operation: &str, error: impl std::fmt::Display) {
        warn!(operation, error = %error, "Lifecycle operation failed");
        self.errors.push(OperationError {
            operation: operation.to_string(),
            message: error.to_string(),
        });
    }
}

pub struct LifecycleManager {
    fixtures: Arc<dyn FixtureRepository>,
    specials: Arc<dyn SpecialPredictionRepository>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    pub fn new(
        fixtures: Arc<dyn FixtureRepository>,
        specials: Arc<dyn SpecialPredictionRepository>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            fixtures,
            specials,
            config,
        }
    }

    /// Lock every scheduled fixture kicking off within the lead window.
    pub async fn close_upcoming_predictions(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let cutoff = now + self.config.lead_window;
        let locked = bounded(
            self.config.store_timeout,
            "fixtures.lock",
            self.fixtures.lock_kicking_off_before(cutoff),
        )
        .await?;

        if !locked.is_empty() {
            info!(count = locked.len(), %cutoff, "Closed predictions");
            debug!(fixture_ids = ?locked, "Locked fixtures");
        }
        Ok(locked)
    }

    /// Move every scheduled fixture that has kicked off to live.
    pub async fn promote_live_fixtures(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let promoted = bounded(
            self.config.store_timeout,
            "fixtures.promote",
            self.fixtures.promote_kicked_off(now),
        )
        .await?;

        if !promoted.is_empty() {
            info!(count = promoted.len(), "Fixtures now live");
            debug!(fixture_ids = ?promoted, "Promoted fixtures");
        }
        Ok(promoted)
    }

    /// Mark live fixtures final once their score is complete and the match
    /// window since kickoff has elapsed.
    pub async fn finalize_scored_fixtures(&self, now: DateTime<Utc>) -> Result<Vec<FixtureId>> {
        let kicked_off_before = now - self.config.final_after;
        let finalized = bounded(
            self.config.store_timeout,
            "fixtures.finalize",
            self.fixtures.finalize_scored(kicked_off_before),
        )
        .await?;

        if !finalized.is_empty() {
            info!(count = finalized.len(), "Fixtures marked final");
            debug!(fixture_ids = ?finalized, "Finalized fixtures");
        }
        Ok(finalized)
    }

    /// Latch the main special-forecast lock once the first fixture of the
    /// tournament has kicked off. Fixtures sharing the earliest kickoff are
    /// interchangeable here; only the timestamp is compared.
    pub async fn evaluate_main_lock(&self, now: DateTime<Utc>) -> Result<LockOutcome> {
        let first_kickoff = bounded(
            self.config.store_timeout,
            "fixtures.earliest_kickoff",
            self.fixtures.earliest_kickoff(),
        )
        .await?;

        self.latch(SpecialLock::Main, first_kickoff, now).await
    }

    /// Latch the home-nation lock once the team's first fixture has kicked off.
    pub async fn evaluate_home_nation_lock(
        &self,
        now: DateTime<Utc>,
        home_nation_id: TeamId,
    ) -> Result<LockOutcome> {
        let first_kickoff = bounded(
            self.config.store_timeout,
            "fixtures.earliest_kickoff_for_team",
            self.fixtures.earliest_kickoff_for_team(home_nation_id),
        )
        .await?;

        self.latch(SpecialLock::HomeNation, first_kickoff, now).await
    }

    async fn latch(
        &self,
        lock: SpecialLock,
        first_kickoff: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<LockOutcome> {
        let Some(first_kickoff) = first_kickoff else {
            return Ok(LockOutcome::NoFixtures);
        };
        if first_kickoff > now {
            return Ok(LockOutcome::NotStarted { first_kickoff });
        }

        let changed = bounded(
            self.config.store_timeout,
            "special_predictions.lock",
            self.specials.set_lock(lock),
        )
        .await?;

        if changed > 0 {
            info!(lock = lock.as_str(), changed, "Special predictions locked");
        }
        Ok(LockOutcome::Locked { changed })
    }

    /// Run every lifecycle step. A failing step is recorded and the
    /// remaining steps still run.
    pub async fn run(&self, now: DateTime<Utc>) -> LifecycleReport {
        let mut report = LifecycleReport::default();

        match self.close_upcoming_predictions(now).await {
            Ok(ids) => report.fixtures_locked = ids.len() as u64,
            Err(e) => report.record_error("close_upcoming_predictions", e),
        }

        match self.promote_live_fixtures(now).await {
            Ok(ids) => report.fixtures_promoted = ids.len() as u64,
            Err(e) => report.record_error("promote_live_fixtures", e),
        }

        match self.finalize_scored_fixtures(now).await {
            Ok(ids) => report.fixtures_finalized = ids.len() as u64,
            Err(e) => report.record_error("finalize_scored_fixtures", e),
        }

        match self.evaluate_main_lock(now).await {
            Ok(outcome) => report.main_lock = Some(outcome),
            Err(e) => report.record_error("evaluate_main_lock", e),
        }

        report.home_nation_lock = match self.config.home_nation_id {
            None => Some(LockOutcome::Disabled),
            Some(team_id) => match self.evaluate_home_nation_lock(now, team_id).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    report.record_error("evaluate_home_nation_lock", e);
                    None
                }
            },
        };

        report
    }
}
