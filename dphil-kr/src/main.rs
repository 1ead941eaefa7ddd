//! dphil-kr - Knowledge Research microservice
//!
//! Researches each thinker once, caches the result in the shared database
//! and refreshes it when it goes stale. Conversation creation calls
//! `POST /knowledge/research`; clients poll `GET /knowledge/:name/status` or
//! listen on `GET /knowledge/events`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dphil_common::config::{database_path, find_config_file, load_toml_config, resolve_root_folder};
use dphil_common::events::EventBus;
use dphil_kr::config::{TomlConfig, MODULE_NAME};
use dphil_kr::db::SqliteKnowledgeStore;
use dphil_kr::services::{KnowledgeService, KnowledgeSource, StalenessPolicy, WikipediaClient};
use dphil_kr::AppState;

/// Command-line arguments for dphil-kr
#[derive(Parser, Debug)]
#[command(name = "dphil-kr")]
#[command(about = "Knowledge Research microservice for Dining Philosophers")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "DPHIL_KR_PORT")]
    port: Option<u16>,

    /// Folder holding the shared database
    #[arg(short, long, env = "DPHIL_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file (default: ~/.config/dphil/dphil-kr.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(|| find_config_file(MODULE_NAME));
    let config: TomlConfig = load_toml_config(config_path.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using compiled defaults"),
    }

    config
        .knowledge
        .validate()
        .context("Invalid [knowledge] configuration")?;

    let port = args.port.unwrap_or(config.port);
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config.root_folder.as_deref());

    info!("Starting {} (Knowledge Research) microservice", MODULE_NAME);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let pool = dphil_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let wikipedia = WikipediaClient::new(&config.knowledge)
        .map_err(|e| anyhow::anyhow!("Failed to create Wikipedia client: {}", e))?;
    let sources: Vec<Arc<dyn KnowledgeSource>> = vec![Arc::new(wikipedia)];

    let event_bus = EventBus::new(100);
    let state = AppState::new(
        Arc::new(SqliteKnowledgeStore::new(pool)),
        sources,
        StalenessPolicy::new(config.knowledge.staleness_threshold()),
        event_bus,
    );
    info!(
        staleness_days = config.knowledge.staleness_days,
        "Knowledge service initialized"
    );

    if let Some(interval) = config.knowledge.refresh_interval() {
        info!("Stale knowledge refresh every {:?}", interval);
        tokio::spawn(refresh_stale_periodically(state.knowledge.clone(), interval));
    }

    let app = dphil_kr::build_router(state);

    let ip: std::net::IpAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind_address: {}", config.bind_address))?;
    let addr = SocketAddr::new(ip, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Run `refresh_all_stale` on a fixed interval
async fn refresh_stale_periodically(knowledge: KnowledgeService, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately; skip it so startup is not a sweep
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = knowledge.refresh_all_stale().await {
            error!(error = %e, "Stale knowledge refresh failed");
        }
    }
}

/// Graceful shutdown signal handler
///
/// In-flight research is abandoned; those records stay in progress and are
/// retried on the next request.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
