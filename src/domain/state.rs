use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixture lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureStatus {
    /// Not yet kicked off
    Scheduled,
    /// Kicked off, result pending
    Live,
    /// Result confirmed, eligible for scoring
    Final,
}

impl FixtureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureStatus::Scheduled => "scheduled",
            FixtureStatus::Live => "live",
            FixtureStatus::Final => "final",
        }
    }

    /// Check if this status can transition to another status.
    ///
    /// Status only ever moves forward. Staying put is allowed so that
    /// re-applying a batch update is a no-op rather than an error.
    pub fn can_transition_to(&self, target: FixtureStatus) -> bool {
        use FixtureStatus::*;

        match (self, target) {
            (a, b) if *a == b => true,
            (Scheduled, Live) => true,
            // Late data: the sync source may deliver the result before we saw kickoff
            (Scheduled, Final) => true,
            (Live, Final) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for FixtureStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(FixtureStatus::Scheduled),
            "live" => Ok(FixtureStatus::Live),
            "final" => Ok(FixtureStatus::Final),
            _ => Err(format!("Unknown fixture status: {}", s)),
        }
    }
}
