use thiserror::Error;

/// Main error type for the matchday pipeline
#[derive(Error, Debug)]
pub enum MatchdayError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store operation `{operation}` timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    // Input errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid status transition: from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MatchdayError {
    /// Input and configuration errors are rejected before any side effect.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MatchdayError::Unauthorized(_)
                | MatchdayError::InvalidInput(_)
                | MatchdayError::Config(_)
        )
    }

    /// Errors caused by the durable store (connectivity, constraints, timeouts)
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            MatchdayError::Database(_) | MatchdayError::Migration(_) | MatchdayError::Timeout { .. }
        )
    }
}

/// Result type alias for MatchdayError
pub type Result<T> = std::result::Result<T, MatchdayError>;
