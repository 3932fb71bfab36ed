//! Leaderboard Aggregator
//!
//! Ranks users by total points, then by exact-score count, and appends one
//! history record per user for every full pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{HistoryRecord, LeaderboardEntry, RankedEntry, RebuildSummary, UserId};
use crate::error::Result;
use crate::store::{bounded, LeaderboardRepository};

/// Counters for one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardReport {
    /// Entries whose totals changed during the rebuild
    pub entries_rebuilt: u64,
    /// Predictions left out of totals because their fixture is missing
    pub orphan_predictions: u64,
    pub entries_ranked: u64,
    pub history_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<UserId>,
    pub recorded_at: Option<DateTime<Utc>>,
    /// Full ranking of this pass; not part of the flat report
    #[serde(skip)]
    pub standings: Vec<RankedEntry>,
}

/// Order entries and assign 1-based positions.
///
/// Points descending, then exact-score count descending. Users tied on both
/// are ordered by id so the result is deterministic; they still receive
/// distinct consecutive positions.
pub fn rank_entries(
    mut entries: Vec<LeaderboardEntry>,
    previous: &HashMap<UserId, u32>,
) -> Vec<RankedEntry> {
    entries.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| b.exact_count.cmp(&a.exact_count))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| RankedEntry {
            position: idx as u32 + 1,
            previous_position: previous.get(&entry.user_id).copied(),
            entry,
        })
        .collect()
}

pub struct LeaderboardAggregator {
    board: Arc<dyn LeaderboardRepository>,
    rebuild_totals: bool,
    store_timeout: Duration,
}

impl LeaderboardAggregator {
    pub fn new(
        board: Arc<dyn LeaderboardRepository>,
        rebuild_totals: bool,
        store_timeout: Duration,
    ) -> Self {
        Self {
            board,
            rebuild_totals,
            store_timeout,
        }
    }

    /// Current ranking without writing history
    pub async fn standings(&self) -> Result<Vec<RankedEntry>> {
        let entries = bounded(
            self.store_timeout,
            "leaderboard.snapshot",
            self.board.snapshot_entries(),
        )
        .await?;
        let previous = bounded(
            self.store_timeout,
            "leaderboard.latest_positions",
            self.board.latest_positions(),
        )
        .await?;
        Ok(rank_entries(entries, &previous))
    }

    /// Every recorded standing of one user, oldest first
    pub async fn history_for(&self, user_id: UserId) -> Result<Vec<HistoryRecord>> {
        bounded(
            self.store_timeout,
            "leaderboard.history_for_user",
            self.board.history_for_user(user_id),
        )
        .await
    }

    /// Full pass: refresh totals, rank, and append one history record per
    /// user stamped with `now`. Prior history is never modified.
    pub async fn recompute_leaderboard(&self, now: DateTime<Utc>) -> Result<LeaderboardReport> {
        let mut report = LeaderboardReport {
            recorded_at: Some(now),
            ..Default::default()
        };

        if self.rebuild_totals {
            let summary = bounded(
                self.store_timeout,
                "leaderboard.rebuild_totals",
                self.board.rebuild_totals(),
            )
            .await?;
            report.entries_rebuilt = summary.entries_changed;
            report.orphan_predictions = summary.orphan_predictions;
            if summary.orphan_predictions > 0 {
                warn!(
                    orphans = summary.orphan_predictions,
                    "Predictions reference missing fixtures; excluded from totals"
                );
            }
            debug!(changed = report.entries_rebuilt, "Leaderboard totals rebuilt");
        }

        let standings = self.standings().await?;
        let records: Vec<HistoryRecord> = standings
            .iter()
            .map(|ranked| HistoryRecord::snapshot(ranked, now))
            .collect();

        report.entries_ranked = standings.len() as u64;
        report.leader = standings.first().map(|r| r.entry.user_id);

        if !records.is_empty() {
            report.history_written = bounded(
                self.store_timeout,
                "leaderboard.append_history",
                self.board.append_history(records),
            )
            .await?;
        }

        info!(
            ranked = report.entries_ranked,
            history = report.history_written,
            rebuilt = report.entries_rebuilt,
            "Leaderboard recomputed"
        );
        report.standings = standings;
        Ok(report)
    }
}
