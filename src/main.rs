use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use screenshot_tool::cache::ResultCache;
use screenshot_tool::cli::{setup_logging, Cli, Commands};
use screenshot_tool::pipeline::Services;
use screenshot_tool::queue::AdmissionQueue;
use screenshot_tool::signer::Signer;
use screenshot_tool::storage::{LocalStorage, ObjectStoreStorage, Storage};
use screenshot_tool::{http, AppConfig, ScreenshotService};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse();
    setup_logging(args.verbose)?;

    info!("Starting screenshot-tool v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Some(Commands::ValidateConfig { env_file }) => validate_config(env_file).await,
        Some(Commands::Serve) | None => serve().await,
    }
}

async fn validate_config(env_file: Option<std::path::PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = env_file {
        load_env_file(&path).await?;
    }

    match AppConfig::from_env() {
        Ok(config) => {
            println!("configuration is valid");
            println!("  server: {}:{}", config.server.host, config.server.port);
            println!("  storage backend: {:?}", config.storage.backend);
            println!(
                "  browser pool size: {}-{}",
                config.browser_pool.min_size, config.browser_pool.max_size
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("configuration is invalid: {e}");
            std::process::exit(1);
        }
    }
}

async fn load_env_file(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    info!("configuration loaded");

    let capture = Arc::new(ScreenshotService::new(&config).await?);

    let cache = Arc::new(ResultCache::new(&config.cache));
    let _cache_eviction_task = cache.clone().spawn_eviction_task(Duration::from_secs(60));

    let queue = Arc::new(AdmissionQueue::new(&config.admission));
    let _queue_stats_task = queue.clone().spawn_stats_log_task(Duration::from_secs(30));

    let signer = Arc::new(Signer::new(&config.signer)?);

    let storage: Arc<dyn Storage> = match config.storage.backend {
        screenshot_tool::config::StorageBackendKind::Local => {
            Arc::new(LocalStorage::new(config.storage.local_dir.clone()).await?)
        }
        screenshot_tool::config::StorageBackendKind::ObjectStore => {
            Arc::new(ObjectStoreStorage::new(&config.storage).await?)
        }
    };

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let host = config.server.host.clone();
    let port = config.server.port;

    let services = Arc::new(Services {
        config,
        capture,
        cache,
        queue,
        signer,
        storage,
        metrics_handle,
    });

    let router = http::router(services.clone());
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("listening on {host}:{port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    services.capture.shutdown().await;
    info!("screenshot-tool stopped");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigint =
        signal::unix::signal(signal::unix::SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm =
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}
