mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catcharr_core::{
    load_config, spawn_refresh_loop, spawn_sweep_loop, validate_config, CatchupService, CliEngine,
    DownloadQueue, History, HttpCatchupService, KvStore, LogSink, NativeEngine, OffScheduleCache,
    SearchEngine, SearchResolver, SearchResultCache, SqliteHistory, SqliteKvStore, SynonymStore,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often registered off-schedule programmes are re-fetched; half the
/// 24 h item TTL, so entries never lapse between refreshes
const OFFSCHEDULE_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// How often orphaned working directories are swept
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CATCHARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully (version {})", VERSION);
    info!("Upstream catalogue: {}", config.upstream.base_url);
    info!("Store path: {:?}", config.store.path);

    // Compute config hash so deployments can be told apart in logs
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Shared key-value store (search cache, synonyms, off-schedule)
    let store: Arc<dyn KvStore> = Arc::new(
        SqliteKvStore::new(&config.store.path).context("Failed to open key-value store")?,
    );
    info!("Key-value store initialized");

    // History store
    let history: Arc<dyn History> = Arc::new(
        SqliteHistory::new(&config.store.path).context("Failed to open history store")?,
    );
    info!("History store initialized");

    // Upstream catalogue client
    let catchup: Arc<dyn CatchupService> = Arc::new(
        HttpCatchupService::new(&config.upstream)
            .context("Failed to create upstream catalogue client")?,
    );

    // Off-schedule programme cache
    let offschedule = Arc::new(OffScheduleCache::new(
        Arc::clone(&store),
        Arc::clone(&catchup),
    ));

    // Search engines: the CLI engine doubles as the native engine's fallback
    let cli_engine: Arc<dyn SearchEngine> = Arc::new(CliEngine::new(
        config.cli.clone(),
        config.search.clone(),
        Arc::clone(&offschedule),
    ));
    let native_engine: Arc<dyn SearchEngine> = Arc::new(NativeEngine::new(
        Arc::clone(&catchup),
        Arc::clone(&cli_engine),
        config.search.clone(),
        config.quality.clone(),
    ));

    let synonyms = Arc::new(SynonymStore::new(Arc::clone(&store)));
    let cache = SearchResultCache::new(
        Arc::clone(&store),
        Duration::from_secs(config.search.cache_ttl_secs),
    );
    let resolver = SearchResolver::new(
        Arc::clone(&synonyms),
        cache,
        native_engine,
        cli_engine,
        Arc::clone(&offschedule),
        config.search.native_search,
    );
    info!(
        "Search resolver initialized (native_search: {})",
        config.search.native_search
    );

    // Download queue
    let queue = Arc::new(DownloadQueue::new(
        config.downloads.clone(),
        config.cli.clone(),
        Arc::clone(&history),
        Arc::new(LogSink),
    ));
    info!(
        "Download queue initialized (active_limit: {})",
        config.downloads.active_limit
    );

    // Background loops
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let refresh_handle = spawn_refresh_loop(
        Arc::clone(&offschedule),
        OFFSCHEDULE_REFRESH_INTERVAL,
        &shutdown_tx,
    );
    let sweep_handle = spawn_sweep_loop(Arc::clone(&queue), STALE_SWEEP_INTERVAL, &shutdown_tx);

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        resolver,
        queue,
        history,
        synonyms,
        offschedule,
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop background loops
    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    let _ = refresh_handle.await;
    let _ = sweep_handle.await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
