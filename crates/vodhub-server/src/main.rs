//! VodHub server - streaming search across third-party VOD catalogs
//!
//! Fans a keyword out to every registered catalog and streams results back
//! over SSE, with cached detail lookups and an on-disk poster cache.

mod config;
mod constants;
mod detail;
mod error;
mod routes;
mod search;
mod sites;
mod state;

use crate::config::{CacheBackendKind, Config};
use crate::error::{Result, ServerError};
use crate::routes::{create_app, start_server};
use crate::sites::SiteDirectory;
use crate::state::AppState;
use catalog_client::CatalogClient;
use image_disk_cache::{ImageStore, ImageStoreConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use ttl_cache::{FileBackend, MemoryBackend, TtlCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("vodhub_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting VodHub server...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Cache backend: {:?}", config.cache_backend);
    info!("Image cache dir: {:?}", config.image_cache_dir);
    info!(
        "Max image cache size: {} MB",
        config.image_cache_max_bytes / (1024 * 1024)
    );

    let cache = match config.cache_backend {
        CacheBackendKind::Memory => TtlCache::new(Arc::new(MemoryBackend::new())),
        CacheBackendKind::File => {
            TtlCache::new(Arc::new(FileBackend::open(config.cache_dir.clone()).await?))
        }
    };

    let (images, sweeper) = ImageStore::new(ImageStoreConfig {
        root: config.image_cache_dir.clone(),
        max_bytes: config.image_cache_max_bytes,
        upstream_base: config.image_upstream_url.clone(),
        timeout: constants::IMAGE_TIMEOUT,
        ..ImageStoreConfig::default()
    });
    images.init().await?;
    tokio::spawn(sweeper.run());

    let sites = SiteDirectory::new(config.sites_url.clone(), config.sites_file.clone());
    match &config.sites_url {
        Some(url) => info!("Site directory: {} (fallback {:?})", url, config.sites_file),
        None => info!("Site directory: {:?}", config.sites_file),
    }

    let catalog = CatalogClient::new();
    let state = AppState::new(sites, cache, Arc::new(catalog.clone()), catalog, images);

    // Start HTTP server (blocking)
    let app = create_app(state, &config.public_path);
    start_server(app, config.port)
        .await
        .map_err(|e| ServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}
