//! Pipeline Orchestrator
//!
//! Runs the stages in a fixed order once per invocation:
//!
//! `SyncFixtures -> CloseDeadlinesAndPromote -> RecalculatePoints -> RecomputeLeaderboard`
//!
//! A failing stage is recorded in its slot and the next stage runs anyway.
//! Every stage is idempotent, so a partially failed run is repaired by the
//! next scheduled run.

pub mod auth;
pub mod sync;

pub use auth::{extract_bearer_token, token_fingerprint, CronAuth};
pub use sync::{FixtureSync, NoopSync, SyncReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::Result;
use crate::leaderboard::{LeaderboardAggregator, LeaderboardReport};
use crate::lifecycle::{LifecycleConfig, LifecycleManager, LifecycleReport};
use crate::scoring::{ScoringEngine, ScoringReport};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SyncFixtures,
    CloseDeadlinesAndPromote,
    RecalculatePoints,
    RecomputeLeaderboard,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::SyncFixtures,
        Stage::CloseDeadlinesAndPromote,
        Stage::RecalculatePoints,
        Stage::RecomputeLeaderboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::SyncFixtures => "sync_fixtures",
            Stage::CloseDeadlinesAndPromote => "close_deadlines_and_promote",
            Stage::RecalculatePoints => "recalculate_points",
            Stage::RecomputeLeaderboard => "recompute_leaderboard",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed counters of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDetail {
    Sync(SyncReport),
    Lifecycle(LifecycleReport),
    Scoring(ScoringReport),
    Leaderboard(LeaderboardReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<StageDetail>,
}

/// Consolidated result of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True only when every stage succeeded
    pub success: bool,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|s| !s.success)
            .map(|s| s.stage)
            .collect()
    }
}

/// Time a stage and fold its outcome into a report slot.
///
/// `judge` decides whether an `Ok` value still represents a partial failure
/// and what message to attach.
async fn run_stage<T, F>(
    stage: Stage,
    work: F,
    judge: impl FnOnce(&T) -> (bool, Option<String>),
    detail: impl FnOnce(T) -> StageDetail,
) -> StageReport
where
    F: Future<Output = Result<T>>,
{
    info!(stage = stage.as_str(), "Stage started");
    let started = Instant::now();
    let outcome = work.await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(value) => {
            let (success, message) = judge(&value);
            if success {
                info!(stage = stage.as_str(), duration_ms, "Stage completed");
            } else {
                error!(
                    stage = stage.as_str(),
                    duration_ms,
                    reason = message.as_deref().unwrap_or_default(),
                    "Stage completed with failures"
                );
            }
            StageReport {
                stage,
                success,
                duration_ms,
                message,
                detail: Some(detail(value)),
            }
        }
        Err(e) => {
            error!(stage = stage.as_str(), duration_ms, error = %e, "Stage failed");
            StageReport {
                stage,
                success: false,
                duration_ms,
                message: Some(e.to_string()),
                detail: None,
            }
        }
    }
}

pub struct Orchestrator {
    sync: Arc<dyn FixtureSync>,
    lifecycle: LifecycleManager,
    scoring: ScoringEngine,
    leaderboard: LeaderboardAggregator,
    auth: CronAuth,
}

impl Orchestrator {
    pub fn new(
        sync: Arc<dyn FixtureSync>,
        lifecycle: LifecycleManager,
        scoring: ScoringEngine,
        leaderboard: LeaderboardAggregator,
        auth: CronAuth,
    ) -> Self {
        Self {
            sync,
            lifecycle,
            scoring,
            leaderboard,
            auth,
        }
    }

    /// Wire every component to one backend
    pub fn from_store<S>(store: Arc<S>, sync: Arc<dyn FixtureSync>, config: &AppConfig) -> Self
    where
        S: Store + 'static,
    {
        let timeout = config.pipeline.store_timeout();
        Self::new(
            sync,
            LifecycleManager::new(
                store.clone(),
                store.clone(),
                LifecycleConfig::from(&config.pipeline),
            ),
            ScoringEngine::new(store.clone(), store.clone(), timeout),
            LeaderboardAggregator::new(store, config.pipeline.rebuild_totals, timeout),
            CronAuth::from_config(&config.auth),
        )
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn leaderboard(&self) -> &LeaderboardAggregator {
        &self.leaderboard
    }

    /// Entry point for the scheduler: check the token, then run.
    ///
    /// An unauthorized call returns an error and touches nothing.
    pub async fn invoke(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<PipelineReport> {
        self.auth.authorize(token)?;
        Ok(self.run(now).await)
    }

    /// Run all stages in order. Always returns a complete report.
    #[instrument(skip(self))]
    pub async fn run(&self, now: DateTime<Utc>) -> PipelineReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%run_id, "Pipeline run started");

        let mut stages = Vec::with_capacity(Stage::ORDER.len());

        stages.push(
            run_stage(
                Stage::SyncFixtures,
                self.sync.sync(now),
                |_| (true, None),
                StageDetail::Sync,
            )
            .await,
        );

        stages.push(
            run_stage(
                Stage::CloseDeadlinesAndPromote,
                async { Ok(self.lifecycle.run(now).await) },
                |report: &LifecycleReport| {
                    let message = (!report.is_clean()).then(|| {
                        report
                            .errors
                            .iter()
                            .map(|e| format!("{}: {}", e.operation, e.message))
                            .collect::<Vec<_>>()
                            .join("; ")
                    });
                    (report.is_clean(), message)
                },
                StageDetail::Lifecycle,
            )
            .await,
        );

        stages.push(
            run_stage(
                Stage::RecalculatePoints,
                self.scoring.recalculate_points(None),
                |report: &ScoringReport| {
                    let message = (!report.is_clean()).then(|| report.errors.join("; "));
                    (report.is_clean(), message)
                },
                StageDetail::Scoring,
            )
            .await,
        );

        stages.push(
            run_stage(
                Stage::RecomputeLeaderboard,
                self.leaderboard.recompute_leaderboard(now),
                |_| (true, None),
                StageDetail::Leaderboard,
            )
            .await,
        );

        let success = stages.iter().all(|s| s.success);
        let elapsed = started.elapsed();
        let finished_at =
            now + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());

        if success {
            info!(%run_id, duration_ms = elapsed.as_millis() as u64, "Pipeline run succeeded");
        } else {
            let failed: Vec<&str> = stages
                .iter()
                .filter(|s| !s.success)
                .map(|s| s.stage.as_str())
                .collect();
            error!(%run_id, ?failed, "Pipeline run finished with failures");
        }

        PipelineReport {
            run_id,
            started_at: now,
            finished_at,
            success,
            stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchdayError;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct FailingSync;

    #[async_trait]
    impl FixtureSync for FailingSync {
        fn name(&self) -> &str {
            "failing"
        }

        async fn sync(&self, _now: DateTime<Utc>) -> Result<SyncReport> {
            Err(MatchdayError::Internal("upstream feed unavailable".into()))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 11, 4, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_stages_run_in_order_on_empty_store() {
        let orchestrator = Orchestrator::from_store(
            Arc::new(MemoryStore::new()),
            Arc::new(NoopSync),
            &AppConfig::local(),
        );
        let report = orchestrator.run(now()).await;

        assert!(report.success);
        let order: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(order, Stage::ORDER.to_vec());
        assert_eq!(report.started_at, now());
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_failed_sync_does_not_stop_later_stages() {
        let orchestrator = Orchestrator::from_store(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingSync),
            &AppConfig::local(),
        );
        let report = orchestrator.run(now()).await;

        assert!(!report.success);
        assert_eq!(report.failed_stages(), vec![Stage::SyncFixtures]);
        let sync = report.stage(Stage::SyncFixtures).unwrap();
        assert!(sync.message.as_deref().unwrap().contains("upstream feed"));
        assert!(report.stage(Stage::RecomputeLeaderboard).unwrap().success);
    }

    #[tokio::test]
    async fn test_unauthorized_invocation_has_no_report() {
        let mut config = AppConfig::local();
        config.auth.required = true;
        config.auth.token = Some("cron-secret".to_string());

        let store = Arc::new(MemoryStore::new());
        let orchestrator = Orchestrator::from_store(store.clone(), Arc::new(NoopSync), &config);

        let err = orchestrator.invoke(Some("nope"), now()).await.unwrap_err();
        assert!(matches!(err, MatchdayError::Unauthorized(_)));
        assert!(store.history().await.is_empty());

        let report = orchestrator
            .invoke(Some("cron-secret"), now())
            .await
            .unwrap();
        assert!(report.success);
    }

    #[test]
    fn test_report_serializes_flat_stage_detail() {
        let report = StageReport {
            stage: Stage::RecalculatePoints,
            success: true,
            duration_ms: 4,
            message: None,
            detail: Some(StageDetail::Scoring(ScoringReport {
                fixtures_processed: 2,
                predictions_updated: 5,
                ..Default::default()
            })),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stage"], "recalculate_points");
        assert_eq!(json["detail"]["kind"], "scoring");
        assert_eq!(json["detail"]["fixtures_processed"], 2);
        assert!(json.get("message").is_none());
    }
}
