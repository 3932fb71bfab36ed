use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::{MatchdayError, Result};

/// Shared-secret check for scheduler invocations
#[derive(Debug, Clone, Default)]
pub struct CronAuth {
    required: bool,
    expected: Option<String>,
}

pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Strip a `Bearer ` prefix from an Authorization header value
pub fn extract_bearer_token(raw: &str) -> Option<&str> {
    raw.strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .map(str::trim)
}

impl CronAuth {
    pub fn new(required: bool, expected: Option<String>) -> Self {
        Self {
            required,
            expected: expected
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.required, config.token.clone())
    }

    /// Reject before any side effect when a token is expected and the
    /// provided one is missing or wrong.
    pub fn authorize(&self, provided: Option<&str>) -> Result<()> {
        let Some(expected) = self.expected.as_deref() else {
            if self.required {
                return Err(MatchdayError::Unauthorized(
                    "auth is required but no cron token is configured".to_string(),
                ));
            }
            return Ok(());
        };

        let Some(provided) = provided.map(str::trim).filter(|v| !v.is_empty()) else {
            return Err(MatchdayError::Unauthorized("missing cron token".to_string()));
        };

        // Compare digests so the comparison length never depends on the input
        let provided_fp = token_fingerprint(provided);
        if provided_fp == token_fingerprint(expected) {
            return Ok(());
        }

        warn!(fingerprint = &provided_fp[..12], "Rejected invalid cron token");
        Err(MatchdayError::Unauthorized("invalid cron token".to_string()))
    }
}
