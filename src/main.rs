// src/main.rs

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use planboard::api::router::app;
use planboard::config::PlanboardConfig;
use planboard::state::AppState;

#[derive(Parser)]
#[command(
    name = "planboard",
    about = "Planning dashboard backend for markdown project workspaces",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Scan the workspace once, publish, and exit
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        eprintln!("No .env file found, using environment variables and defaults");
    }
    let config = PlanboardConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("planboard={}", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sync => sync_once(config).await,
    }
}

async fn serve(config: PlanboardConfig) -> anyhow::Result<()> {
    info!("Starting planboard in {:?} mode", config.storage_mode);
    info!("Workspace root: {}", config.workspace_root);

    let bind_address = config.bind_address();
    let state = Arc::new(AppState::from_config(config));
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Dashboard API listening on http://{}", bind_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
}

/// One-shot sync script: scan, publish, then tear the store handle down.
/// This is the only path that closes the shared connection.
async fn sync_once(config: PlanboardConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let counts = state.orchestrator.sync_manual().await?;
    info!(
        "Synced {} projects, {} tasks, {} outputs",
        counts.projects, counts.tasks, counts.outputs
    );
    state.shutdown().await;
    Ok(())
}
