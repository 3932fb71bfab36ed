use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Summary returned by a fixture sync source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub source: String,
    pub fixtures_upserted: u64,
}

/// External collaborator that refreshes fixture rows before the lifecycle
/// stage runs.
///
/// Implementations must leave every fixture in a consistent state: scores
/// either both present or both absent, statuses never moved backwards.
#[async_trait]
pub trait FixtureSync: Send + Sync {
    fn name(&self) -> &str;

    async fn sync(&self, now: DateTime<Utc>) -> Result<SyncReport>;
}

/// Used when fixture rows are maintained by a separate process
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSync;

#[async_trait]
impl FixtureSync for NoopSync {
    fn name(&self) -> &str {
        "noop"
    }

    async fn sync(&self, _now: DateTime<Utc>) -> Result<SyncReport> {
        Ok(SyncReport {
            source: self.name().to_string(),
            fixtures_upserted: 0,
        })
    }
}
