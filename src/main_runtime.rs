use matchday::config::{AppConfig, LoggingConfig};
use matchday::error::Result;
use matchday::pipeline::{FixtureSync, NoopSync, Orchestrator};
use matchday::{MemoryStore, PostgresStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn default_directives(level: &str) -> String {
    match level {
        "info" => "info,matchday=debug,sqlx=warn".to_string(),
        other => format!("{other},sqlx=warn"),
    }
}

/// Initialize logging with console output and, when `MATCHDAY_LOG_DIR` is
/// set, a daily rotating file.
pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&logging.level)));

    // `tracing_appender::rolling::daily` panics if it cannot create the
    // initial file, so preflight writability first.
    let file_layer = std::env::var("MATCHDAY_LOG_DIR").ok().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let test_path = Path::new(&log_dir).join(".matchday_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(&log_dir, "matchday.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive for the life of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    let file_logging_enabled = file_layer.is_some();
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init();

    if file_logging_enabled {
        info!("File logging enabled");
    }
}

/// Minimal logging for one-shot commands
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

/// Load configuration; a seeded run falls back to local defaults when no
/// configuration is available.
pub fn load_config(dir: &Path, seeded: bool) -> anyhow::Result<AppConfig> {
    match AppConfig::load_from(dir) {
        Ok(config) => Ok(config),
        Err(e) if seeded => {
            eprintln!(
                "Warning: Could not load configuration from {} ({}), using local defaults",
                dir.display(),
                e
            );
            Ok(AppConfig::local())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn ensure_valid(config: &AppConfig) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|problems| anyhow::anyhow!("invalid configuration: {}", problems.join("; ")))
}

/// Wire the orchestrator to Postgres, or to a seeded in-memory store
pub async fn build_orchestrator(config: &AppConfig, seed: Option<&Path>) -> Result<Orchestrator> {
    let sync: Arc<dyn FixtureSync> = Arc::new(NoopSync);
    match seed {
        Some(path) => {
            let store = MemoryStore::from_seed_file(path).await?;
            info!(seed = %path.display(), "Using in-memory store");
            Ok(Orchestrator::from_store(Arc::new(store), sync, config))
        }
        None => {
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            Ok(Orchestrator::from_store(Arc::new(store), sync, config))
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received");
}
