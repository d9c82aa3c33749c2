use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

mod app;
mod cli;
mod http;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "notepress_gateway=info,notepress_publisher=info,notepress_store=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = notepress_core::NotepressConfig::load(cli.config.as_deref())?;
    let store = app::build_store(&config)?;
    let state = Arc::new(app::AppState::new(config, store));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::PublishOnce { now } => publish_once(&state, now.unwrap_or_else(Utc::now)).await,
    }
}

async fn serve(state: Arc<app::AppState>) -> anyhow::Result<ExitCode> {
    if state.config.cron.secret.is_none() {
        warn!("cron.secret is not set; /api/cron/publish accepts unauthenticated calls");
    }

    let addr: SocketAddr =
        format!("{}:{}", state.config.gateway.bind, state.config.gateway.port).parse()?;
    let router = app::build_router(state);

    info!("notepress gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("notepress gateway stopped");
    Ok(ExitCode::SUCCESS)
}

async fn publish_once(
    state: &app::AppState,
    now: chrono::DateTime<Utc>,
) -> anyhow::Result<ExitCode> {
    let batch = state.scheduler.run(now).await?;
    println!("{}", serde_json::to_string_pretty(&batch)?);
    if batch.failed_count() > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c; shutting down");
    }
}
