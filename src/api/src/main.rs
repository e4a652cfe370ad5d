//! F1DB Statistics API
//!
//! REST API and CLI for loading and querying the Formula 1 dataset.

mod cli;
mod config;
mod ingest;
mod models;
mod routes;
mod storage;
mod types;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::routes::AppState;
use crate::storage::Repository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "f1db_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    match cli.command {
        Commands::Serve { host, port } => run_server(config, host, port).await,
        Commands::Load {
            data_dir,
            force,
            format,
        } => cli::run_load(&config, data_dir, force, format),
        Commands::LoadFile {
            entity,
            file,
            format,
        } => cli::run_load_file(&config, entity, file, format),
        Commands::Reconcile => cli::run_reconcile(&config),
        Commands::Stats => cli::run_stats(&config),
    }
}

/// Run the API server.
async fn run_server(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("Database path: {}", config.database.path.display());

    let repo = Repository::new(&config.database.path)?;

    // Create application state
    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        config: config.clone(),
    });

    // Build router
    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
