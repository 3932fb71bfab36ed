use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::pipeline::Orchestrator;

/// Shared state for the trigger endpoints
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,

    /// Source of `now` for each invocation
    pub clock: fn() -> DateTime<Utc>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl ApiState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            clock: Utc::now,
            start_time: Utc::now(),
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds().max(0)
    }
}
