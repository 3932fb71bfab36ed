use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::FixtureStatus;

pub type FixtureId = i64;
pub type TeamId = i64;

/// Match outcome category derived from the sign of the goal difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    HomeWin,
    Draw,
    AwayWin,
}

/// A pair of non-negative goal counts, home side first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// Outcome category: sign(home - away)
    pub fn outcome(&self) -> Outcome {
        match self.home.cmp(&self.away) {
            Ordering::Greater => Outcome::HomeWin,
            Ordering::Equal => Outcome::Draw,
            Ordering::Less => Outcome::AwayWin,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// A single scheduled match between two teams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: FixtureId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub kickoff_at: DateTime<Utc>,
    #[serde(default)]
    pub venue: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    pub status: FixtureStatus,
    #[serde(default)]
    pub predictions_locked: bool,
}

impl Fixture {
    /// Final score, only when both components are present
    pub fn final_score(&self) -> Option<Score> {
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some(Score::new(home, away)),
            _ => None,
        }
    }

    /// A half-filled score is a data error from the sync source
    pub fn has_partial_score(&self) -> bool {
        self.home_score.is_some() != self.away_score.is_some()
    }

    pub fn involves(&self, team_id: TeamId) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    /// Final with a complete result
    pub fn is_scorable(&self) -> bool {
        self.status == FixtureStatus::Final && self.final_score().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixture(home_score: Option<u32>, away_score: Option<u32>, status: FixtureStatus) -> Fixture {
        Fixture {
            id: 1,
            home_team_id: 10,
            away_team_id: 20,
            kickoff_at: Utc.with_ymd_and_hms(2026, 6, 11, 19, 0, 0).unwrap(),
            venue: "Estadio Azteca".to_string(),
            home_score,
            away_score,
            status,
            predictions_locked: false,
        }
    }

    #[test]
    fn test_outcome_from_score() {
        assert_eq!(Score::new(2, 1).outcome(), Outcome::HomeWin);
        assert_eq!(Score::new(0, 0).outcome(), Outcome::Draw);
        assert_eq!(Score::new(1, 3).outcome(), Outcome::AwayWin);
    }

    #[test]
    fn test_final_score_requires_both_sides() {
        let complete = fixture(Some(2), Some(0), FixtureStatus::Final);
        assert_eq!(complete.final_score(), Some(Score::new(2, 0)));
        assert!(complete.is_scorable());

        let partial = fixture(Some(2), None, FixtureStatus::Final);
        assert_eq!(partial.final_score(), None);
        assert!(partial.has_partial_score());
        assert!(!partial.is_scorable());

        let live = fixture(Some(1), Some(1), FixtureStatus::Live);
        assert!(!live.is_scorable());
    }

    #[test]
    fn test_involves_either_side() {
        let f = fixture(None, None, FixtureStatus::Scheduled);
        assert!(f.involves(10));
        assert!(f.involves(20));
        assert!(!f.involves(30));
    }
}
