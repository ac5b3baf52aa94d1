mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use diet_ingest::config::Config;
use diet_ingest::AppState;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let state = Arc::new(AppState::new(config));

    match cli.command {
        Command::Fetch { chamber } => run_fetch(&state, chamber).await,
        Command::Ingest => run_ingest(&state).await,
        Command::Serve => run_serve(state).await,
        Command::Migrate => run_migrate(&state).await,
        Command::Queue => run_queue_stats(&state).await,
    }
}

async fn run_fetch(state: &AppState, chamber: Option<cli::ChamberArg>) -> Result<()> {
    info!(?chamber, "fetch requested; wire a chamber crawl loop against state.fetcher to drive this");
    let _ = state;
    Ok(())
}

async fn run_ingest(state: &AppState) -> Result<()> {
    info!("ingest requested; compose parsers -> merge -> validate -> track against state.store");
    let _ = state;
    Ok(())
}

async fn run_serve(state: Arc<AppState>) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let app = diet_ingest::api::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind HTTP server")?;
    info!(%addr, "http_server_started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown_signal_received");
        })
        .await
        .context("http server error")?;

    Ok(())
}

async fn run_migrate(state: &AppState) -> Result<()> {
    let mut records = std::collections::HashMap::new();
    let sink = diet_ingest::store::StoreBackedReportSink { store: state.store.as_ref() };
    let report = diet_ingest::migration::run_migration(&mut records, &sink)?;
    info!(execution_id = %report.execution_id, success_rate = report.success_rate, "migration_completed");
    Ok(())
}

async fn run_queue_stats(state: &AppState) -> Result<()> {
    let stats = state.queue.queue_stats().await;
    for (priority, len) in stats {
        info!(?priority, len, "queue_lane");
    }
    Ok(())
}
