//! FindME daemon
//!
//! Serves the submission API, the `/files` mount and age-progressed photos.

use anyhow::Context;
use clap::Parser;
use findme_aging::AgeProgressionResolver;
use findme_api::{cors_layer, create_router, AppState};
use findme_core::{FindmeConfig, LoggingConfig};
use findme_store::{
    CommentStore, MemoryCommentStore, MemorySubmissionStore, MemoryUserStore, SubmissionStore,
    UserStore,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// findmed - missing-persons platform API server
#[derive(Parser, Debug)]
#[command(name = "findmed")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the API server
    #[arg(long)]
    address: Option<String>,

    /// Port for the REST API server
    #[arg(long)]
    port: Option<u16>,

    /// Root of the static file mount
    #[arg(long)]
    files_dir: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<FindmeConfig> {
    let mut config = match &args.config {
        Some(path) => FindmeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => FindmeConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(address) = &args.address {
        config.api.address = address.clone();
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(files_dir) = &args.files_dir {
        config.storage.files_dir = files_dir.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let directives = config.filter.as_deref().unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .context("invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set subscriber: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging)?;

    info!("Starting FindME daemon v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn SubmissionStore> = match &config.storage.seed_file {
        Some(path) => Arc::new(MemorySubmissionStore::from_seed_file(path).await?),
        None => Arc::new(MemorySubmissionStore::new()),
    };

    let resolver = AgeProgressionResolver::from_config(&config)?;
    resolver.init().await?;
    if resolver.provider_names().is_empty() {
        warn!("No age-progression providers configured; serving enhanced originals");
    }

    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::from_seeds(&config.auth.users));
    if config.auth.users.is_empty() {
        warn!("No user accounts configured; every authenticated route will answer 401");
    }
    let comments: Arc<dyn CommentStore> = Arc::new(MemoryCommentStore::new());

    let state = Arc::new(AppState::from_config(
        &config,
        store,
        users,
        comments,
        Arc::new(resolver),
    ));
    let mut router = create_router(state);
    if let Some(cors) = cors_layer(&config.api) {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", config.api.address, config.api.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.api.address, config.api.port))?;

    info!(
        %addr,
        files_dir = %config.storage.files_dir.display(),
        "API server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
