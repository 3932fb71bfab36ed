use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Per-user scoring aggregate, persisted for ranking reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub exact_count: i64,
    #[serde(default)]
    pub correct_outcomes: i64,
    #[serde(default)]
    pub predictions_scored: i64,
}

impl LeaderboardEntry {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            total_points: 0,
            exact_count: 0,
            correct_outcomes: 0,
            predictions_scored: 0,
        }
    }
}

/// Outcome of recomputing totals from scored predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub entries_changed: u64,
    /// Predictions whose fixture no longer exists; excluded from totals
    pub orphan_predictions: u64,
}

/// An entry with its computed position for one aggregation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub position: u32,
    /// Position in the most recent history snapshot, if any
    pub previous_position: Option<u32>,
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
}

impl RankedEntry {
    /// Places gained since the previous snapshot (negative when dropping)
    pub fn movement(&self) -> Option<i64> {
        self.previous_position
            .map(|prev| i64::from(prev) - i64::from(self.position))
    }
}

/// Immutable snapshot of one user's standing at one aggregation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub user_id: UserId,
    pub position: u32,
    pub total_points: i64,
    pub exact_count: i64,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn snapshot(ranked: &RankedEntry, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user_id: ranked.entry.user_id,
            position: ranked.position,
            total_points: ranked.entry.total_points,
            exact_count: ranked.entry.exact_count,
            recorded_at,
        }
    }
}
