use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FixtureId, Score, TeamId};

pub type UserId = Uuid;

/// A user's forecast for one fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub user_id: UserId,
    pub fixture_id: FixtureId,
    pub home_goals: u32,
    pub away_goals: u32,
    /// Unset until the fixture is scored for the first time
    #[serde(default)]
    pub points: Option<i32>,
    #[serde(default)]
    pub is_exact: bool,
}

impl Prediction {
    pub fn forecast(&self) -> Score {
        Score::new(self.home_goals, self.away_goals)
    }

    /// Whether storing `award` would change anything
    pub fn differs_from(&self, award: Award) -> bool {
        self.points != Some(award.points) || self.is_exact != award.exact
    }
}

/// Points granted for one prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub points: i32,
    pub exact: bool,
}

/// Pending write of a freshly computed award
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub prediction_id: i64,
    pub points: i32,
    pub is_exact: bool,
}

/// Tournament-level forecasts, one per user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPrediction {
    pub user_id: UserId,
    #[serde(default)]
    pub champion_team_id: Option<TeamId>,
    #[serde(default)]
    pub runner_up_team_id: Option<TeamId>,
    #[serde(default)]
    pub top_scorer: Option<String>,
    /// How far the home nation gets (e.g. "quarter_final")
    #[serde(default)]
    pub home_nation_stage: Option<String>,
    /// Set once the tournament has started
    #[serde(default)]
    pub main_locked: bool,
    /// Set once the home nation's first fixture has started
    #[serde(default)]
    pub home_nation_locked: bool,
}

/// Which special-forecast latch to set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialLock {
    Main,
    HomeNation,
}

impl SpecialLock {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialLock::Main => "main",
            SpecialLock::HomeNation => "home_nation",
        }
    }

    pub fn is_set(&self, special: &SpecialPrediction) -> bool {
        match self {
            SpecialLock::Main => special.main_locked,
            SpecialLock::HomeNation => special.home_nation_locked,
        }
    }
}
