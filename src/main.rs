//! Ekklesia Daemon
//!
//! Serves the congregation hierarchy API over HTTP from a local SQLite file.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! ekklesia
//!
//! # Start with custom config
//! ekklesia --config /path/to/config.toml
//!
//! # Start with custom HTTP port and storage directory
//! ekklesia --http-port 8096 --storage-dir /data/ekklesia
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ekklesia::services::events::spawn_logging_listener;
use ekklesia::{Config, Database, HttpServer, Services};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ekklesia")]
#[command(about = "Cell-church hierarchy service")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "EKKLESIA_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "EKKLESIA_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "EKKLESIA_HTTP_PORT")]
    http_port: Option<u16>,

    /// SQLite database file, overrides `storage_dir/database_file`
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ekklesia=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path).with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        Config::default()
    };

    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        "Starting ekklesia"
    );

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db_path = args.database_url.unwrap_or_else(|| config.database_path());
    let db = Arc::new(Database::open(&db_path, config.pool_size)?);
    let stats = db.stats()?;
    info!(
        congregations = stats.congregation_count,
        cells = stats.cell_count,
        members = stats.member_count,
        reports = stats.report_count,
        "Database ready"
    );

    let services = Arc::new(Services::new(db.clone()));
    spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = config
        .http_addr()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.http_addr()))?;
    let http_server = Arc::new(HttpServer::new(services, db, http_addr));

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                        - Health check");
    info!("  GET  /cells/{{id}}/attendance         - Monthly attendance for one cell");
    info!("  GET  /attendance                    - Monthly attendance across the caller's scope");
    info!("  POST /cells/{{id}}/reports            - Save a meeting report");
    info!("  POST /cells/{{id}}/split              - Multiply a cell");
    info!("  GET  /cells/{{id}}/access             - Access check for the caller");
    info!("  PUT  /congregations/{{id}}/principal  - Make a congregation principal");
    info!("  PUT  /networks/{{id}}/pastor          - Assign a network pastor");

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
