use chrono::Duration;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Minutes before kickoff at which predictions close
    #[serde(default = "default_lead_window_minutes")]
    pub lead_window_minutes: i64,
    /// Minutes after kickoff before a scored live fixture may be marked final
    #[serde(default = "default_final_after_minutes")]
    pub final_after_minutes: i64,
    /// Upper bound for any single store call
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Team whose first fixture closes the home-nation special forecasts
    #[serde(default)]
    pub home_nation_id: Option<i64>,
    /// Rebuild leaderboard totals from predictions before ranking
    #[serde(default = "default_rebuild_totals")]
    pub rebuild_totals: bool,
}

fn default_lead_window_minutes() -> i64 {
    60
}

fn default_final_after_minutes() -> i64 {
    120
}

fn default_store_timeout_ms() -> u64 {
    10_000
}

fn default_rebuild_totals() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lead_window_minutes: default_lead_window_minutes(),
            final_after_minutes: default_final_after_minutes(),
            store_timeout_ms: default_store_timeout_ms(),
            home_nation_id: None,
            rebuild_totals: default_rebuild_totals(),
        }
    }
}

impl PipelineConfig {
    pub fn lead_window(&self) -> Duration {
        Duration::minutes(self.lead_window_minutes)
    }

    pub fn final_after(&self) -> Duration {
        Duration::minutes(self.final_after_minutes)
    }

    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Reject pipeline invocations without a matching token
    #[serde(default = "default_auth_required")]
    pub required: bool,
    /// Shared secret expected from the scheduler
    #[serde(default)]
    pub token: Option<String>,
}

fn default_auth_required() -> bool {
    true
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: default_auth_required(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("database.url", "postgres://localhost/matchday")?
            .set_default("database.max_connections", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("MATCHDAY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // MATCHDAY_DATABASE__URL, MATCHDAY_PIPELINE__HOME_NATION_ID, ...
            .add_source(
                Environment::with_prefix("MATCHDAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        if config.auth.token.is_none() {
            config.auth.token = std::env::var("MATCHDAY_CRON_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        Ok(config)
    }

    /// Configuration for running against a seeded in-memory store
    pub fn local() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/matchday".to_string(),
                max_connections: 5,
            },
            pipeline: PipelineConfig::default(),
            auth: AuthConfig {
                required: false,
                token: None,
            },
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pipeline.lead_window_minutes < 0 {
            errors.push("pipeline.lead_window_minutes must not be negative".to_string());
        }

        if self.pipeline.final_after_minutes < 0 {
            errors.push("pipeline.final_after_minutes must not be negative".to_string());
        }

        if self.pipeline.store_timeout_ms == 0 {
            errors.push("pipeline.store_timeout_ms must be positive".to_string());
        }

        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be positive".to_string());
        }

        if self.auth.required && self.auth.token.as_deref().map_or(true, str::is_empty) {
            errors.push(
                "auth.required is set but no token is configured (auth.token or MATCHDAY_CRON_TOKEN)"
                    .to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
