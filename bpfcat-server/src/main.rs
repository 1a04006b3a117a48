//! bpfcat REST API server
//!
//! Serves the repository catalog over HTTP. Configuration comes from the
//! config file with environment overrides for containerized deployments.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use bpfcat_core::{AnalyzerClient, Config, Database};
use bpfcat_server::api::{self, AppState};

#[derive(Parser, Debug)]
#[command(name = "bpfcat-server")]
#[command(about = "REST API server for the bpfcat repository catalog")]
#[command(version)]
struct Args {
    /// Address to bind, overriding the config file
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database path, overriding the config file
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database.path = Some(database);
    }

    let _log_guard =
        bpfcat_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("bpfcat server starting up");

    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let analyzer =
        AnalyzerClient::new(&config.analyzers).context("failed to create analyzer client")?;

    let state = AppState::new(db, analyzer, &config.server);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    tracing::info!(addr = %config.server.bind_addr, "bpfcat API ready");

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
