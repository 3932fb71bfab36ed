use anyhow::{bail, Result};
use chrono::Utc;
use matchday::api::{create_router, ApiState};
use matchday::cli::{Cli, Commands};
use matchday::PostgresStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::main_runtime::{
    build_orchestrator, ensure_valid, init_logging, init_logging_simple, load_config,
    shutdown_signal,
};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run { token, seed } => {
            let config = load_config(&cli.config, seed.is_some())?;
            init_logging(&config.logging);
            ensure_valid(&config)?;

            let orchestrator = build_orchestrator(&config, seed.as_deref()).await?;
            let report = orchestrator.invoke(token.as_deref(), Utc::now()).await?;
            info!(report = %serde_json::to_string(&report)?, "Pipeline report");
            print_json(&report)?;

            if !report.success {
                let failed: Vec<&str> = report.failed_stages().iter().map(|s| s.as_str()).collect();
                bail!("pipeline finished with failed stages: {}", failed.join(", "));
            }
        }
        Commands::Score { fixture, seed } => {
            init_logging_simple();
            let config = load_config(&cli.config, seed.is_some())?;
            let orchestrator = build_orchestrator(&config, seed.as_deref()).await?;
            let report = orchestrator.scoring().recalculate_points(*fixture).await?;
            print_json(&report)?;
        }
        Commands::Leaderboard { user, seed } => {
            init_logging_simple();
            let config = load_config(&cli.config, seed.is_some())?;
            let orchestrator = build_orchestrator(&config, seed.as_deref()).await?;
            match user {
                Some(user_id) => {
                    let history = orchestrator.leaderboard().history_for(*user_id).await?;
                    print_json(&history)?;
                }
                None => {
                    let standings = orchestrator.leaderboard().standings().await?;
                    print_json(&standings)?;
                }
            }
        }
        Commands::Serve => {
            let config = load_config(&cli.config, false)?;
            init_logging(&config.logging);
            ensure_valid(&config)?;

            let orchestrator = Arc::new(build_orchestrator(&config, None).await?);
            let app = create_router(ApiState::new(orchestrator));
            let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
            info!(bind = %config.server.bind, "Cron trigger listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Commands::Migrate => {
            let config = load_config(&cli.config, false)?;
            init_logging(&config.logging);
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            store.migrate().await?;
            info!("Migrations applied");
        }
        Commands::CheckConfig => {
            init_logging_simple();
            let config = load_config(&cli.config, false)?;
            match config.validate() {
                Ok(()) => println!("Configuration OK"),
                Err(problems) => {
                    for problem in &problems {
                        error!(%problem, "Invalid configuration");
                        println!("  - {problem}");
                    }
                    bail!("{} configuration problem(s)", problems.len());
                }
            }
        }
    }
    Ok(())
}
